//! Poke notifications: bitmap decode, scrolling, history and rendering
//!
//! Bitmaps are move-only owned buffers. The network task decodes them and
//! moves them into a `NetworkEvent`; whoever holds them last drops them,
//! which is the only way their memory is released.

pub mod bitmap;
pub mod history;
pub mod renderer;
pub mod scroll;

pub use bitmap::{Bitmap, BitmapError, PokeBitmaps, MAX_BITMAP_PAGES, MAX_BITMAP_WIDTH, MAX_ENCODED_LEN};
pub use history::{PokeHistory, PokeRecord, HISTORY_CAPACITY};
pub use renderer::{PokeContent, PokeRenderer, PokeScroll};
pub use scroll::{ScrollState, SCROLL_GAP, SCROLL_INTERVAL_MS, SCROLL_STEP};

use heapless::String;

/// Copy `text` into a bounded string, truncating on a character boundary
pub fn bounded<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_truncates_on_char_boundary() {
        let s: String<4> = bounded("abcdef");
        assert_eq!(s.as_str(), "abcd");

        // 'é' is two bytes and does not fit after three ASCII bytes
        let s: String<4> = bounded("abcé");
        assert_eq!(s.as_str(), "abc");
    }
}
