//! 8x8 block transpose from row-major bitplanes to display pages

use super::{FRAME_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Errors from the frame transpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Width or height does not fit the panel, or height is not page aligned
    UnsupportedSize,
    /// Source holds fewer than `ceil(width/8) * height` bytes
    SourceTooShort,
}

/// Convert one animation frame into the panel's native page layout
///
/// Source: `ceil(width/8) * height` bytes, row-major, MSB = leftmost pixel.
/// Destination: pages of 128 bytes, bit n of a byte is row `page*8 + n`.
///
/// Every bit is inverted and the image is rotated 180°: destination pages
/// and byte-columns are walked in reverse while each 8x8 block is
/// transposed. Column 0 of every page is forced to zero afterwards because
/// the source encoder leaves padding garbage in the rightmost source column.
pub fn transpose_frame(
    src: &[u8],
    width: usize,
    height: usize,
    dst: &mut [u8; FRAME_BYTES],
) -> Result<(), CodecError> {
    if width == 0 || width > SCREEN_WIDTH || height == 0 || height > SCREEN_HEIGHT || height % 8 != 0
    {
        return Err(CodecError::UnsupportedSize);
    }

    let bpr = width.div_ceil(8);
    if src.len() < bpr * height {
        return Err(CodecError::SourceTooShort);
    }

    let pages = height / 8;
    for sp in 0..pages {
        let dp = pages - 1 - sp;
        for sbc in 0..bpr {
            let dbc = bpr - 1 - sbc;

            let mut rows = [0u8; 8];
            for (row, r) in rows.iter_mut().enumerate() {
                *r = !src[(sp * 8 + row) * bpr + sbc];
            }

            let base = dp * SCREEN_WIDTH + dbc * 8;
            for col in 0..8 {
                let mask = 0x80 >> col;
                let mut v = 0u8;
                for (row, r) in rows.iter().enumerate() {
                    if r & mask != 0 {
                        v |= 0x80 >> row;
                    }
                }
                dst[base + 7 - col] = v;
            }
        }
    }

    for page in 0..pages {
        dst[page * SCREEN_WIDTH] = 0;
    }

    Ok(())
}

/// Playback delay for one frame
///
/// The authored delay divided by the speed divisor, never below 1 ms so
/// playback always advances.
pub fn frame_delay_ms(delay_ms: u16, speed: u16) -> u32 {
    u32::from(delay_ms / speed.max(1)).max(1)
}
