//! Poke and history screens

use heapless::String;

use super::bitmap::{Bitmap, PokeBitmaps};
use super::history::{PokeHistory, PokeRecord};
use super::scroll::{needs_scroll, source_column, ScrollState};
use super::bounded;
use crate::clock;
use crate::codec::SCREEN_WIDTH;
use crate::display::{draw_lines, draw_scrolled_line, text_width, FrameBuffer};
use crate::state::{MAX_SENDER_LEN, MAX_TEXT_LEN};
use crate::timezone::TimeZone;

/// Header line above a live poke
pub const POKE_HEADER: &str = ">> Poke! <<";

/// Top row of the sender bitmap
const SENDER_BITMAP_Y: i32 = 15;

/// What a poke screen shows below its header
#[derive(Debug, Clone, Copy)]
pub enum PokeContent<'a> {
    Text { sender: &'a str, text: &'a str },
    Bitmaps(&'a PokeBitmaps),
}

impl PokeContent<'_> {
    pub fn needs_scroll(&self) -> bool {
        match self {
            PokeContent::Text { sender, text } => {
                needs_scroll(text_width(sender)) || needs_scroll(text_width(text))
            }
            PokeContent::Bitmaps(b) => needs_scroll(b.max_width()),
        }
    }
}

impl<'a> From<&'a PokeRecord> for PokeContent<'a> {
    fn from(record: &'a PokeRecord) -> Self {
        match &record.bitmaps {
            Some(b) => PokeContent::Bitmaps(b),
            None => PokeContent::Text {
                sender: &record.sender,
                text: &record.text,
            },
        }
    }
}

/// Scroll offsets of one poke screen
///
/// Bitmaps share one offset (wrapping at the widest bitmap); text lines
/// scroll independently.
#[derive(Debug, Clone, Copy)]
pub struct PokeScroll {
    shared: ScrollState,
    sender: ScrollState,
    text: ScrollState,
}

impl PokeScroll {
    pub const fn new(now_ms: u64) -> Self {
        Self {
            shared: ScrollState::new(now_ms),
            sender: ScrollState::new(now_ms),
            text: ScrollState::new(now_ms),
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        *self = Self::new(now_ms);
    }

    /// Step the offsets if the interval has elapsed; true when redraw is needed
    pub fn tick(&mut self, now_ms: u64, content: &PokeContent<'_>) -> bool {
        if !content.needs_scroll() || !self.shared.due(now_ms) {
            return false;
        }
        match content {
            PokeContent::Bitmaps(b) => self.shared.step(b.max_width()),
            PokeContent::Text { sender, text } => {
                self.sender.step(text_width(sender));
                self.text.step(text_width(text));
            }
        }
        true
    }

    pub fn bitmap_offset(&self) -> u32 {
        self.shared.offset()
    }
}

/// OR a page-format bitmap into the frame with its top row at `y0`
fn blit(fb: &mut FrameBuffer, bitmap: &Bitmap, y0: i32, offset: u32) {
    for screen_x in 0..SCREEN_WIDTH as u32 {
        let Some(src) = source_column(screen_x, offset, bitmap.width()) else {
            continue;
        };
        for page in 0..bitmap.pages() {
            let byte = bitmap.column(page, src);
            if byte == 0 {
                continue;
            }
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    fb.set_pixel(screen_x as i32, y0 + (page * 8 + bit) as i32, true);
                }
            }
        }
    }
}

/// Draw a poke screen: header on line 1, content below
pub fn draw_poke(fb: &mut FrameBuffer, header: &str, content: &PokeContent<'_>, scroll: &PokeScroll) {
    match content {
        PokeContent::Text { sender, text } => {
            draw_lines(fb, &[header, ""]);
            draw_scrolled_line(fb, 2, sender, scroll.sender.offset());
            draw_scrolled_line(fb, 3, text, scroll.text.offset());
        }
        PokeContent::Bitmaps(b) => {
            draw_lines(fb, &[header]);
            let offset = scroll.shared.offset();
            blit(fb, &b.sender, SENDER_BITMAP_Y, offset);
            let text_y = SENDER_BITMAP_Y + b.sender.height() as i32 + 1;
            blit(fb, &b.text, text_y, offset);
        }
    }
}

/// The poke currently on screen
#[derive(Debug)]
pub struct ActivePoke {
    pub sender: String<MAX_SENDER_LEN>,
    pub text: String<MAX_TEXT_LEN>,
    pub bitmaps: Option<PokeBitmaps>,
    scroll: PokeScroll,
}

impl ActivePoke {
    pub fn content(&self) -> PokeContent<'_> {
        match &self.bitmaps {
            Some(b) => PokeContent::Bitmaps(b),
            None => PokeContent::Text {
                sender: &self.sender,
                text: &self.text,
            },
        }
    }
}

/// Owns the active poke and the history ring
#[derive(Debug)]
pub struct PokeRenderer {
    active: Option<ActivePoke>,
    history: PokeHistory,
    history_index: usize,
    history_scroll: PokeScroll,
}

impl Default for PokeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PokeRenderer {
    pub const fn new() -> Self {
        Self {
            active: None,
            history: PokeHistory::new(),
            history_index: 0,
            history_scroll: PokeScroll::new(0),
        }
    }

    /// Make a text poke active and record it
    pub fn show_text(&mut self, sender: &str, text: &str, timestamp: Option<u64>, now_ms: u64) {
        self.release_active();
        let sender = bounded(sender);
        let text = bounded(text);
        self.history.push(PokeRecord {
            sender: sender.clone(),
            text: text.clone(),
            timestamp,
            bitmaps: None,
        });
        self.active = Some(ActivePoke {
            sender,
            text,
            bitmaps: None,
            scroll: PokeScroll::new(now_ms),
        });
    }

    /// Make a bitmap poke active and record it
    ///
    /// Takes ownership of `bitmaps`; the ring stores its own copies. If the
    /// copy cannot be allocated the ring keeps the text only.
    pub fn show_bitmaps(
        &mut self,
        sender: &str,
        text: &str,
        bitmaps: PokeBitmaps,
        timestamp: Option<u64>,
        now_ms: u64,
    ) {
        self.release_active();
        let sender = bounded(sender);
        let text = bounded(text);
        self.history.push(PokeRecord {
            sender: sender.clone(),
            text: text.clone(),
            timestamp,
            bitmaps: bitmaps.try_clone().ok(),
        });
        self.active = Some(ActivePoke {
            sender,
            text,
            bitmaps: Some(bitmaps),
            scroll: PokeScroll::new(now_ms),
        });
    }

    /// Drop the active poke and its bitmaps; a no-op when none is active
    pub fn release_active(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&ActivePoke> {
        self.active.as_ref()
    }

    pub fn active_needs_scroll(&self) -> bool {
        self.active
            .as_ref()
            .map(|p| p.content().needs_scroll())
            .unwrap_or(false)
    }

    /// Advance the active poke's scroll; true when redraw is needed
    pub fn tick_active(&mut self, now_ms: u64) -> bool {
        match &mut self.active {
            Some(poke) => {
                let content = match &poke.bitmaps {
                    Some(b) => PokeContent::Bitmaps(b),
                    None => PokeContent::Text {
                        sender: &poke.sender,
                        text: &poke.text,
                    },
                };
                poke.scroll.tick(now_ms, &content)
            }
            None => false,
        }
    }

    pub fn draw_active(&self, fb: &mut FrameBuffer) {
        if let Some(poke) = &self.active {
            draw_poke(fb, POKE_HEADER, &poke.content(), &poke.scroll);
        }
    }

    pub fn history(&self) -> &PokeHistory {
        &self.history
    }

    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Select a history entry and restart its scroll
    pub fn select_history(&mut self, index: usize, now_ms: u64) {
        self.history_index = index;
        self.history_scroll.reset(now_ms);
    }

    pub fn history_needs_scroll(&self) -> bool {
        self.history
            .get(self.history_index)
            .map(PokeRecord::needs_scroll)
            .unwrap_or(false)
    }

    /// Advance the selected entry's scroll; true when redraw is needed
    pub fn tick_history(&mut self, now_ms: u64) -> bool {
        match self.history.get(self.history_index) {
            Some(record) => self.history_scroll.tick(now_ms, &PokeContent::from(record)),
            None => false,
        }
    }

    /// Draw the selected entry, or the empty-history screen
    pub fn draw_history(&self, fb: &mut FrameBuffer, zone: &TimeZone) {
        match self.history.get(self.history_index) {
            Some(record) => {
                let header = clock::history_header(record.timestamp, zone);
                draw_poke(fb, &header, &PokeContent::from(record), &self.history_scroll);
            }
            None => draw_lines(fb, &["[ No Pokes ]", "", "No history yet."]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poke::bitmap::live_bitmaps;
    use alloc::vec;

    fn bitmaps(sender_w: u16, text_w: u16) -> PokeBitmaps {
        PokeBitmaps {
            sender: Bitmap::from_pages(vec![0xFF; usize::from(sender_w) * 2], sender_w).unwrap(),
            text: Bitmap::from_pages(vec![0x01; usize::from(text_w) * 2], text_w).unwrap(),
        }
    }

    #[test]
    fn test_bitmap_poke_owns_original_and_ring_owns_copy() {
        let before = live_bitmaps();
        let mut r = PokeRenderer::new();
        r.show_bitmaps("a", "b", bitmaps(40, 300), Some(1), 0);
        assert_eq!(live_bitmaps(), before + 4);

        r.release_active();
        assert_eq!(live_bitmaps(), before + 2);

        // Second release is a no-op
        r.release_active();
        assert_eq!(live_bitmaps(), before + 2);
        assert!(r.history().get(0).unwrap().bitmaps.is_some());
    }

    #[test]
    fn test_new_poke_releases_previous_active() {
        let before = live_bitmaps();
        let mut r = PokeRenderer::new();
        r.show_bitmaps("a", "b", bitmaps(40, 40), None, 0);
        r.show_text("c", "d", None, 10);
        // Only the ring copy of the first poke remains
        assert_eq!(live_bitmaps(), before + 2);
        assert_eq!(r.active().unwrap().text.as_str(), "d");
        assert_eq!(r.history().len(), 2);
    }

    #[test]
    fn test_bitmap_layout() {
        let mut r = PokeRenderer::new();
        r.show_bitmaps("a", "b", bitmaps(40, 100), None, 0);
        let mut fb = FrameBuffer::new();
        r.draw_active(&mut fb);

        // Sender: 2 pages of 0xFF at y = 15..31, columns 0..40
        assert!(fb.pixel(0, 15));
        assert!(fb.pixel(39, 30));
        assert!(!fb.pixel(40, 20));
        // Text: bit 0 of each page, starting at y = 15 + 16 + 1
        assert!(fb.pixel(5, 32));
        assert!(!fb.pixel(5, 33));
        assert!(fb.pixel(5, 40));
    }

    #[test]
    fn test_wide_bitmap_scrolls_and_narrow_does_not() {
        let mut r = PokeRenderer::new();
        r.show_bitmaps("a", "b", bitmaps(40, 300), None, 0);
        assert!(r.active_needs_scroll());
        assert!(!r.tick_active(10));
        assert!(r.tick_active(30));

        let mut fb = FrameBuffer::new();
        r.draw_active(&mut fb);
        // Narrow sender ignores the offset
        assert!(fb.pixel(0, 15));
        assert_eq!(r.active().unwrap().scroll.bitmap_offset(), 2);
        assert!(fb.pixel(0, 32));

        let mut narrow = PokeRenderer::new();
        narrow.show_bitmaps("a", "b", bitmaps(40, 100), None, 0);
        assert!(!narrow.tick_active(100));
    }

    #[test]
    fn test_empty_history_screen() {
        let r = PokeRenderer::new();
        let mut fb = FrameBuffer::new();
        r.draw_history(&mut fb, &TimeZone::UTC);
        assert!(fb.lit() > 0);
        assert!(!r.history_needs_scroll());
    }

    #[test]
    fn test_history_selection_resets_scroll() {
        let mut r = PokeRenderer::new();
        r.show_text("sender", "a very long message that needs to scroll sideways", Some(0), 0);
        r.select_history(0, 0);
        assert!(r.history_needs_scroll());
        assert!(r.tick_history(30));
        assert_eq!(r.history_scroll.sender.offset(), 0);
        assert_eq!(r.history_scroll.text.offset(), 2);

        r.select_history(0, 40);
        assert_eq!(r.history_scroll.text.offset(), 0);
    }
}
