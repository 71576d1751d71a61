//! Base64 page-format bitmaps
//!
//! A bitmap is `pages * width` bytes: byte `page * width + x` holds rows
//! `page*8 ..= page*8+7` of column `x`, bit n = row `page*8 + n`.

use alloc::vec::Vec;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qbit_protocol::message::BitmapFields;

/// Longest accepted base64 field
pub const MAX_ENCODED_LEN: usize = 8192;

/// Widest accepted bitmap
pub const MAX_BITMAP_WIDTH: u32 = 512;

/// Tallest accepted bitmap, in pages
pub const MAX_BITMAP_PAGES: usize = 8;

/// Why a bitmap payload was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitmapError {
    /// Encoded field longer than `MAX_ENCODED_LEN`
    TooLong,
    /// Width zero or above `MAX_BITMAP_WIDTH`
    InvalidWidth,
    /// Not valid base64, or empty
    Malformed,
    /// Decoded length is not a multiple of the width
    UnevenLength,
    /// More than `MAX_BITMAP_PAGES` pages
    TooTall,
    /// Heap exhausted
    OutOfMemory,
}

#[cfg(test)]
std::thread_local! {
    static LIVE: core::cell::Cell<isize> = const { core::cell::Cell::new(0) };
}

/// Bitmaps currently allocated on this thread
#[cfg(test)]
pub(crate) fn live_bitmaps() -> isize {
    LIVE.with(|c| c.get())
}

/// An owned, decoded bitmap
///
/// Not `Clone`: copying allocates, so it goes through [`Bitmap::try_clone`].
#[derive(Debug, PartialEq, Eq)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u16,
}

impl Bitmap {
    fn from_parts(data: Vec<u8>, width: u16) -> Self {
        #[cfg(test)]
        LIVE.with(|c| c.set(c.get() + 1));
        Self { data, width }
    }

    /// Decode a base64 field, enforcing the size caps
    ///
    /// Nothing is allocated when the length or width checks fail.
    pub fn decode(encoded: &str, width: u32) -> Result<Self, BitmapError> {
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(BitmapError::TooLong);
        }
        if width == 0 || width > MAX_BITMAP_WIDTH {
            return Err(BitmapError::InvalidWidth);
        }

        let estimate = base64::decoded_len_estimate(encoded.len());
        let mut data = Vec::new();
        data.try_reserve_exact(estimate)
            .map_err(|_| BitmapError::OutOfMemory)?;
        data.resize(estimate, 0);

        let len = STANDARD
            .decode_slice(encoded.as_bytes(), &mut data)
            .map_err(|_| BitmapError::Malformed)?;
        data.truncate(len);

        let width_bytes = width as usize;
        if len == 0 {
            return Err(BitmapError::Malformed);
        }
        if len % width_bytes != 0 {
            return Err(BitmapError::UnevenLength);
        }
        if len / width_bytes > MAX_BITMAP_PAGES {
            return Err(BitmapError::TooTall);
        }

        Ok(Self::from_parts(data, width as u16))
    }

    /// Build from raw page bytes (already validated elsewhere)
    pub fn from_pages(data: Vec<u8>, width: u16) -> Result<Self, BitmapError> {
        if width == 0 || u32::from(width) > MAX_BITMAP_WIDTH {
            return Err(BitmapError::InvalidWidth);
        }
        let w = usize::from(width);
        if data.is_empty() || data.len() % w != 0 {
            return Err(BitmapError::UnevenLength);
        }
        if data.len() / w > MAX_BITMAP_PAGES {
            return Err(BitmapError::TooTall);
        }
        Ok(Self::from_parts(data, width))
    }

    /// Allocate a copy
    pub fn try_clone(&self) -> Result<Self, BitmapError> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())
            .map_err(|_| BitmapError::OutOfMemory)?;
        data.extend_from_slice(&self.data);
        Ok(Self::from_parts(data, self.width))
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    /// Height in pages
    pub fn pages(&self) -> usize {
        self.data.len() / usize::from(self.width)
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.pages() as u32 * 8
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Page byte for column `x`, zero outside the bitmap
    pub fn column(&self, page: usize, x: u32) -> u8 {
        if x >= self.width() {
            return 0;
        }
        self.data
            .get(page * usize::from(self.width) + x as usize)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        #[cfg(test)]
        LIVE.with(|c| c.set(c.get() - 1));
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Bitmap {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Bitmap {{ width: {}, pages: {} }}", self.width, self.pages())
    }
}

/// Sender and message bitmaps of one poke
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PokeBitmaps {
    pub sender: Bitmap,
    pub text: Bitmap,
}

impl PokeBitmaps {
    /// Decode both fields; if either fails nothing stays allocated
    pub fn decode(fields: &BitmapFields<'_>) -> Result<Self, BitmapError> {
        let sender = Bitmap::decode(fields.sender, fields.sender_width)?;
        // `sender` is dropped here if the text bitmap is rejected
        let text = Bitmap::decode(fields.text, fields.text_width)?;
        Ok(Self { sender, text })
    }

    /// Copy both bitmaps
    pub fn try_clone(&self) -> Result<Self, BitmapError> {
        Ok(Self {
            sender: self.sender.try_clone()?,
            text: self.text.try_clone()?,
        })
    }

    /// Widest of the two
    pub fn max_width(&self) -> u32 {
        self.sender.width().max(self.text.width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use proptest::prelude::*;

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_valid() {
        let raw: Vec<u8> = (0..80u8).collect();
        let b = Bitmap::decode(&encode(&raw), 40).unwrap();
        assert_eq!(b.width(), 40);
        assert_eq!(b.pages(), 2);
        assert_eq!(b.height(), 16);
        assert_eq!(b.column(1, 3), 43);
        assert_eq!(b.column(0, 40), 0);
    }

    #[test]
    fn test_decode_rejects_too_long_without_allocating() {
        let before = live_bitmaps();
        let encoded = "A".repeat(9000);
        assert_eq!(Bitmap::decode(&encoded, 40), Err(BitmapError::TooLong));
        assert_eq!(live_bitmaps(), before);
    }

    #[test]
    fn test_decode_rejects_bad_width() {
        let encoded = encode(&[0u8; 16]);
        assert_eq!(Bitmap::decode(&encoded, 0), Err(BitmapError::InvalidWidth));
        assert_eq!(Bitmap::decode(&encoded, 513), Err(BitmapError::InvalidWidth));
    }

    #[test]
    fn test_decode_rejects_uneven_and_tall() {
        let encoded = encode(&[0u8; 30]);
        assert_eq!(Bitmap::decode(&encoded, 7), Err(BitmapError::UnevenLength));

        let encoded = encode(&[0u8; 9 * 10]);
        assert_eq!(Bitmap::decode(&encoded, 10), Err(BitmapError::TooTall));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(Bitmap::decode("not base64!!", 4), Err(BitmapError::Malformed));
        assert_eq!(Bitmap::decode("", 4), Err(BitmapError::Malformed));
    }

    #[test]
    fn test_pair_decode_releases_sender_on_text_failure() {
        let before = live_bitmaps();
        let sender = encode(&[1u8; 40]);
        let fields = BitmapFields {
            sender: &sender,
            sender_width: 40,
            text: "%%%",
            text_width: 40,
        };
        assert_eq!(PokeBitmaps::decode(&fields), Err(BitmapError::Malformed));
        assert_eq!(live_bitmaps(), before);
    }

    #[test]
    fn test_clone_and_drop_counts() {
        let before = live_bitmaps();
        let b = Bitmap::decode(&encode(&[0xAA; 32]), 16).unwrap();
        let c = b.try_clone().unwrap();
        assert_eq!(live_bitmaps(), before + 2);
        assert_eq!(b, c);
        drop(b);
        drop(c);
        assert_eq!(live_bitmaps(), before);
    }

    proptest! {
        #[test]
        fn test_caps_hold_for_any_input(len in 0usize..1200, width in 0u32..600) {
            let raw = alloc::vec![0x5Au8; len];
            let encoded = encode(&raw);
            match Bitmap::decode(&encoded, width) {
                Ok(b) => {
                    prop_assert!(b.width() <= MAX_BITMAP_WIDTH);
                    prop_assert!(b.pages() <= MAX_BITMAP_PAGES);
                    prop_assert_eq!(b.len() % b.width() as usize, 0);
                    prop_assert_eq!(b.len(), len);
                }
                Err(_) => {
                    let ok = len > 0
                        && width > 0
                        && width <= MAX_BITMAP_WIDTH
                        && len % width as usize == 0
                        && len / width as usize <= MAX_BITMAP_PAGES;
                    prop_assert!(!ok);
                }
            }
        }
    }
}
