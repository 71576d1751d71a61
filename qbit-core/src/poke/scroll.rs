//! Circular horizontal scrolling
//!
//! Content wider than the screen scrolls through a virtual width of
//! `width + SCROLL_GAP`; columns that land in the gap render blank.

use crate::codec::SCREEN_WIDTH;

/// Blank gap between the end of the content and its repeat
pub const SCROLL_GAP: u32 = 64;

/// Pixels advanced per step
pub const SCROLL_STEP: u32 = 2;

/// Time between steps
pub const SCROLL_INTERVAL_MS: u64 = 30;

/// Whether content of this width needs to scroll
pub fn needs_scroll(width: u32) -> bool {
    width > SCREEN_WIDTH as u32
}

/// Scroll modulus for content of this width
pub fn virtual_width(width: u32) -> u32 {
    width + SCROLL_GAP
}

/// Source column shown at `screen_x`, or `None` if that column is blank
///
/// Content that fits is drawn unscrolled from column 0.
pub fn source_column(screen_x: u32, offset: u32, width: u32) -> Option<u32> {
    if !needs_scroll(width) {
        return (screen_x < width).then_some(screen_x);
    }
    let src = (screen_x + offset) % virtual_width(width);
    (src < width).then_some(src)
}

/// Offset and step timer of one scrolling region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScrollState {
    offset: u32,
    last_step_ms: u64,
}

impl ScrollState {
    pub const fn new(now_ms: u64) -> Self {
        Self {
            offset: 0,
            last_step_ms: now_ms,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.offset = 0;
        self.last_step_ms = now_ms;
    }

    /// Advance one step, wrapping at the virtual width
    pub fn step(&mut self, width: u32) {
        if !needs_scroll(width) {
            return;
        }
        self.offset += SCROLL_STEP;
        let vw = virtual_width(width);
        if self.offset >= vw {
            self.offset -= vw;
        }
    }

    /// Whether a step is due at `now_ms`; restarts the interval if so
    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_step_ms) < SCROLL_INTERVAL_MS {
            return false;
        }
        self.last_step_ms = now_ms;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_after_exact_step_count() {
        let mut s = ScrollState::new(0);
        assert_eq!(virtual_width(200), 264);

        for i in 1..=132 {
            s.step(200);
            if i < 132 {
                assert_ne!(s.offset(), 0, "wrapped early at step {}", i);
            }
        }
        assert_eq!(s.offset(), 0);
    }

    #[test]
    fn test_narrow_content_does_not_move() {
        let mut s = ScrollState::new(0);
        s.step(128);
        assert_eq!(s.offset(), 0);
        assert_eq!(source_column(10, 50, 100), Some(10));
        assert_eq!(source_column(110, 0, 100), None);
    }

    #[test]
    fn test_gap_is_blank() {
        // Width 200: columns 200..264 of the virtual strip are the gap
        assert_eq!(source_column(0, 199, 200), Some(199));
        assert_eq!(source_column(0, 200, 200), None);
        assert_eq!(source_column(63, 200, 200), None);
        assert_eq!(source_column(64, 200, 200), Some(0));
    }

    #[test]
    fn test_due_interval() {
        let mut s = ScrollState::new(1000);
        assert!(!s.due(1029));
        assert!(s.due(1030));
        assert!(!s.due(1031));
        assert!(s.due(1060));
    }

    proptest! {
        #[test]
        fn test_offset_stays_in_virtual_width(width in 129u32..600, steps in 0usize..2000) {
            let mut s = ScrollState::new(0);
            for _ in 0..steps {
                s.step(width);
            }
            prop_assert!(s.offset() < virtual_width(width));
            prop_assert_eq!(s.offset(), (steps as u32 * SCROLL_STEP) % virtual_width(width));
        }
    }
}
