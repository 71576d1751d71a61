//! Ring of the most recent pokes

use heapless::String;

use super::PokeBitmaps;
use crate::display::text_width;
use crate::poke::scroll::needs_scroll;
use crate::state::{MAX_SENDER_LEN, MAX_TEXT_LEN};

/// Entries kept in the ring
pub const HISTORY_CAPACITY: usize = 3;

/// One received poke
#[derive(Debug)]
pub struct PokeRecord {
    pub sender: String<MAX_SENDER_LEN>,
    pub text: String<MAX_TEXT_LEN>,
    /// Unix seconds when received, `None` before the clock was synced
    pub timestamp: Option<u64>,
    /// The ring's own copies of the bitmaps
    pub bitmaps: Option<PokeBitmaps>,
}

impl PokeRecord {
    /// Whether any part of this record scrolls when shown
    pub fn needs_scroll(&self) -> bool {
        match &self.bitmaps {
            Some(b) => needs_scroll(b.max_width()),
            None => {
                needs_scroll(text_width(&self.sender)) || needs_scroll(text_width(&self.text))
            }
        }
    }
}

/// Fixed-capacity ring, index 0 = most recent
#[derive(Debug)]
pub struct PokeHistory {
    slots: [Option<PokeRecord>; HISTORY_CAPACITY],
    head: usize,
    count: usize,
}

impl Default for PokeHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PokeHistory {
    pub const fn new() -> Self {
        Self {
            slots: [None, None, None],
            head: 0,
            count: 0,
        }
    }

    /// Insert a record, evicting the oldest when full
    ///
    /// The evicted record (and any bitmaps it owns) is dropped before the
    /// new one is stored.
    pub fn push(&mut self, record: PokeRecord) {
        let slot = &mut self.slots[self.head];
        *slot = None;
        *slot = Some(record);

        self.head = (self.head + 1) % HISTORY_CAPACITY;
        if self.count < HISTORY_CAPACITY {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record `index` steps back from the most recent
    pub fn get(&self, index: usize) -> Option<&PokeRecord> {
        if index >= self.count {
            return None;
        }
        let pos = (self.head + HISTORY_CAPACITY - 1 - index) % HISTORY_CAPACITY;
        self.slots[pos].as_ref()
    }
}
