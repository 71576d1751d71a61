//! Fair random animation order
//!
//! Every item is handed out once per round (Fisher-Yates). When a round is
//! exhausted the bag is reshuffled, and if the new round would start with
//! the item that ended the old one, that item is swapped elsewhere.

use heapless::Vec;

use super::library::MAX_ANIMATIONS;

/// Xorshift32 generator
///
/// Not cryptographic. Also supplies WebSocket keys and masks, which only
/// need to be unpredictable to intermediaries.
#[derive(Debug, Clone, Copy)]
pub struct Rng(u32);

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    pub fn fill_bytes(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    /// Uniform-ish value in `0..n`, `n > 0`
    fn below(&mut self, n: usize) -> usize {
        (self.next_u32() % n as u32) as usize
    }
}

/// Shuffle bag of library indices
#[derive(Debug, Clone)]
pub struct ShuffleBag {
    items: Vec<u8, MAX_ANIMATIONS>,
    pos: usize,
    rng: Rng,
}

impl ShuffleBag {
    pub fn new(seed: u32) -> Self {
        Self {
            items: Vec::new(),
            pos: 0,
            rng: Rng::new(seed),
        }
    }

    /// Refill with `items` and start a fresh round
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = usize>) {
        self.items.clear();
        for item in items {
            if self.items.push(item as u8).is_err() {
                break;
            }
        }
        self.shuffle();
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn shuffle(&mut self) {
        for i in (1..self.items.len()).rev() {
            let j = self.rng.below(i + 1);
            self.items.swap(i, j);
        }
    }

    /// Next item, reshuffling when the round is over
    pub fn next(&mut self) -> Option<usize> {
        let n = self.items.len();
        match n {
            0 => return None,
            1 => return Some(usize::from(self.items[0])),
            _ => {}
        }

        if self.pos >= n {
            let last = self.items[n - 1];
            self.shuffle();
            if self.items[0] == last {
                let swap = 1 + self.rng.below(n - 1);
                self.items.swap(0, swap);
            }
            self.pos = 0;
        }

        let item = self.items[self.pos];
        self.pos += 1;
        Some(usize::from(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_and_single() {
        let mut bag = ShuffleBag::new(1);
        assert_eq!(bag.next(), None);

        bag.rebuild([7]);
        for _ in 0..5 {
            assert_eq!(bag.next(), Some(7));
        }
    }

    #[test]
    fn test_round_hands_out_each_item_once() {
        let mut bag = ShuffleBag::new(42);
        bag.rebuild(0..6);
        let mut seen = [false; 6];
        for _ in 0..6 {
            let i = bag.next().unwrap();
            assert!(!seen[i]);
            seen[i] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_fill_bytes_partial_word() {
        let mut a = super::Rng::new(7);
        let mut b = super::Rng::new(7);
        let mut buf = [0u8; 6];
        a.fill_bytes(&mut buf);
        let w0 = b.next_u32().to_le_bytes();
        let w1 = b.next_u32().to_le_bytes();
        assert_eq!(buf[..4], w0);
        assert_eq!(buf[4..], w1[..2]);
    }

    proptest! {
        #[test]
        fn test_no_repeat_across_rounds(seed in any::<u32>(), n in 2usize..12, rounds in 1usize..6) {
            let mut bag = ShuffleBag::new(seed);
            bag.rebuild(0..n);
            let mut prev = None;
            for _ in 0..n * rounds {
                let item = bag.next().unwrap();
                prop_assert!(item < n);
                prop_assert_ne!(Some(item), prev);
                prev = Some(item);
            }
        }
    }
}
