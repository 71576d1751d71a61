//! `.qgif` animation container
//!
//! Layout (all integers little-endian):
//! - `frame_count: u8`, `width: u16`, `height: u16`
//! - `frame_count` x `delay_ms: u16`
//! - `frame_count` x 1024-byte frames (128x64, row-major, MSB first)

use super::{FRAME_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Size of the fixed header
pub const QGIF_HEADER_SIZE: usize = 5;

/// Errors from parsing a `.qgif` container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QgifError {
    /// Fewer bytes than the header declares
    Truncated,
    /// Only 128x64 animations are playable
    BadDimensions,
    /// Frame count is zero
    NoFrames,
    /// Requested frame index is past the end
    FrameOutOfRange,
}

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QgifHeader {
    pub frame_count: u8,
    pub width: u16,
    pub height: u16,
}

impl QgifHeader {
    /// Parse and validate the 5-byte header
    pub fn parse(bytes: &[u8]) -> Result<Self, QgifError> {
        if bytes.len() < QGIF_HEADER_SIZE {
            return Err(QgifError::Truncated);
        }

        let header = Self {
            frame_count: bytes[0],
            width: u16::from_le_bytes([bytes[1], bytes[2]]),
            height: u16::from_le_bytes([bytes[3], bytes[4]]),
        };

        if header.frame_count == 0 {
            return Err(QgifError::NoFrames);
        }
        if usize::from(header.width) != SCREEN_WIDTH || usize::from(header.height) != SCREEN_HEIGHT
        {
            return Err(QgifError::BadDimensions);
        }

        Ok(header)
    }

    /// Byte offset of the delay table
    pub const fn delays_offset(&self) -> usize {
        QGIF_HEADER_SIZE
    }

    /// Byte offset of the first frame
    pub const fn data_offset(&self) -> usize {
        QGIF_HEADER_SIZE + self.frame_count as usize * 2
    }

    /// Byte offset of frame `index`
    pub fn frame_offset(&self, index: usize) -> Result<usize, QgifError> {
        if index >= usize::from(self.frame_count) {
            return Err(QgifError::FrameOutOfRange);
        }
        Ok(self.data_offset() + index * FRAME_BYTES)
    }

    /// Total container size
    pub const fn total_len(&self) -> usize {
        self.data_offset() + self.frame_count as usize * FRAME_BYTES
    }
}

/// A fully in-memory `.qgif`
#[derive(Debug, Clone, Copy)]
pub struct Qgif<'a> {
    header: QgifHeader,
    data: &'a [u8],
}

impl<'a> Qgif<'a> {
    /// Validate a complete container
    pub fn parse(data: &'a [u8]) -> Result<Self, QgifError> {
        let header = QgifHeader::parse(data)?;
        if data.len() < header.total_len() {
            return Err(QgifError::Truncated);
        }
        Ok(Self { header, data })
    }

    pub fn header(&self) -> QgifHeader {
        self.header
    }

    pub fn frame_count(&self) -> usize {
        usize::from(self.header.frame_count)
    }

    /// Authored delay of frame `index` in milliseconds
    pub fn delay(&self, index: usize) -> Result<u16, QgifError> {
        if index >= self.frame_count() {
            return Err(QgifError::FrameOutOfRange);
        }
        let at = self.header.delays_offset() + index * 2;
        Ok(u16::from_le_bytes([self.data[at], self.data[at + 1]]))
    }

    /// Raw bitplane of frame `index`
    pub fn frame(&self, index: usize) -> Result<&'a [u8], QgifError> {
        let at = self.header.frame_offset(index)?;
        Ok(&self.data[at..at + FRAME_BYTES])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Build a container whose frame `i` is filled with byte `i`
    pub(crate) fn build_qgif(delays: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(delays.len() as u8);
        out.extend_from_slice(&128u16.to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes());
        for d in delays {
            out.extend_from_slice(&d.to_le_bytes());
        }
        for i in 0..delays.len() {
            out.extend(core::iter::repeat(i as u8).take(FRAME_BYTES));
        }
        out
    }

    #[test]
    fn test_parse_valid() {
        let data = build_qgif(&[100, 250]);
        let gif = Qgif::parse(&data).unwrap();
        assert_eq!(gif.frame_count(), 2);
        assert_eq!(gif.delay(1), Ok(250));
        assert!(gif.frame(1).unwrap().iter().all(|b| *b == 1));
        assert_eq!(gif.frame(2), Err(QgifError::FrameOutOfRange));
        assert_eq!(gif.header().data_offset(), 9);
    }

    #[test]
    fn test_rejects_wrong_dimensions() {
        let mut data = build_qgif(&[100]);
        data[1] = 64;
        assert_eq!(Qgif::parse(&data).err(), Some(QgifError::BadDimensions));
    }

    #[test]
    fn test_rejects_empty_and_truncated() {
        let mut data = build_qgif(&[100]);
        data[0] = 0;
        assert_eq!(Qgif::parse(&data).err(), Some(QgifError::NoFrames));

        let data = build_qgif(&[100, 100]);
        assert_eq!(
            Qgif::parse(&data[..data.len() - 1]).err(),
            Some(QgifError::Truncated)
        );
        assert_eq!(QgifHeader::parse(&data[..4]), Err(QgifError::Truncated));
    }
}
