//! 128x64 monochrome frame buffer

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

use crate::codec::{FRAME_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Frame buffer in native page layout
///
/// Byte `page * 128 + col` holds rows `page*8 ..= page*8+7`, bit n = row
/// `page*8 + n`. Upright pixel (x, y) is stored at native (127-x, 63-y).
#[derive(Clone)]
pub struct FrameBuffer {
    buf: [u8; FRAME_BYTES],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_BYTES],
        }
    }

    pub fn clear(&mut self) {
        self.buf.fill(0);
    }

    /// Bytes ready to send to the panel
    pub fn as_bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.buf
    }

    /// Direct access for data already in native orientation (animation frames)
    pub fn native_mut(&mut self) -> &mut [u8; FRAME_BYTES] {
        &mut self.buf
    }

    fn locate(x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x >= SCREEN_WIDTH as i32 || y >= SCREEN_HEIGHT as i32 {
            return None;
        }
        let nx = SCREEN_WIDTH - 1 - x as usize;
        let ny = SCREEN_HEIGHT - 1 - y as usize;
        Some(((ny / 8) * SCREEN_WIDTH + nx, 1 << (ny % 8)))
    }

    /// Set or clear an upright pixel; out-of-range coordinates are clipped
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if let Some((idx, mask)) = Self::locate(x, y) {
            if on {
                self.buf[idx] |= mask;
            } else {
                self.buf[idx] &= !mask;
            }
        }
    }

    /// Read an upright pixel; out-of-range reads are dark
    pub fn pixel(&self, x: i32, y: i32) -> bool {
        Self::locate(x, y)
            .map(|(idx, mask)| self.buf[idx] & mask != 0)
            .unwrap_or(false)
    }

    /// Number of lit pixels
    pub fn lit(&self) -> u32 {
        self.buf.iter().map(|b| b.count_ones()).sum()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::transpose_frame;

    #[test]
    fn test_upright_pixel_is_stored_rotated() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(0, 0, true);
        // Top-left upright is the last byte, top bit
        assert_eq!(fb.as_bytes()[FRAME_BYTES - 1], 0x80);
        assert!(fb.pixel(0, 0));

        fb.set_pixel(127, 63, true);
        assert_eq!(fb.as_bytes()[0], 0x01);
        assert_eq!(fb.lit(), 2);
    }

    #[test]
    fn test_clipping() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(-1, 0, true);
        fb.set_pixel(128, 0, true);
        fb.set_pixel(0, 64, true);
        assert_eq!(fb.lit(), 0);
        assert!(!fb.pixel(200, 200));
    }

    #[test]
    fn test_transposed_frame_reads_upright() {
        let mut src = [0xFFu8; FRAME_BYTES];
        // Clear source pixel (20, 5) so it lights after inversion
        src[5 * 16 + 2] &= !(0x80 >> 4);

        let mut fb = FrameBuffer::new();
        transpose_frame(&src, 128, 64, fb.native_mut()).unwrap();

        assert!(fb.pixel(20, 5));
        assert_eq!(fb.lit(), 1);
    }
}
