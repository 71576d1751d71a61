//! Frame-streaming animation player

use super::library::{AnimationLibrary, LibraryError};
use super::shuffle::ShuffleBag;
use crate::codec::{frame_delay_ms, transpose_frame, FRAME_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::display::FrameBuffer;
use crate::traits::AnimationStore;

/// Plays one library animation at a time, advancing through a shuffle bag
pub struct Player {
    bag: ShuffleBag,
    current: Option<usize>,
    frame: usize,
    /// Uptime at which the next frame is due
    next_due_ms: u64,
    loop_count: u8,
    /// Loops before auto-advancing, 0 = never
    loops_per_animation: u8,
    speed: u16,
    scratch: [u8; FRAME_BYTES],
}

impl Player {
    pub fn new(seed: u32, speed: u16) -> Self {
        Self {
            bag: ShuffleBag::new(seed),
            current: None,
            frame: 0,
            next_due_ms: 0,
            loop_count: 0,
            loops_per_animation: 0,
            speed: speed.max(1),
            scratch: [0; FRAME_BYTES],
        }
    }

    /// Playback speed divisor, at least 1
    pub fn set_speed(&mut self, speed: u16) {
        self.speed = speed.max(1);
    }

    pub fn speed(&self) -> u16 {
        self.speed
    }

    pub fn set_auto_advance(&mut self, loops: u8) {
        self.loops_per_animation = loops;
    }

    /// Fill the shuffle bag with every playable animation
    pub fn build_shuffle_bag(&mut self, library: &AnimationLibrary) {
        self.bag.rebuild(library.playable());
    }

    /// Next index from the shuffle bag
    pub fn next_shuffle(&mut self) -> Option<usize> {
        self.bag.next()
    }

    /// Start `index` from its first frame; the first frame is due at once
    pub fn play(&mut self, index: usize) {
        self.current = Some(index);
        self.frame = 0;
        self.loop_count = 0;
        self.next_due_ms = 0;
    }

    /// Switch to the next shuffled animation, returning its index
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.next_shuffle()?;
        self.play(next);
        Some(next)
    }

    pub fn stop(&mut self) {
        self.current = None;
    }

    /// Make the next frame of the current animation due at once
    pub fn resume(&mut self) {
        self.next_due_ms = 0;
    }

    /// Draw one frame of `index` into `fb`, outside of normal playback
    ///
    /// Returns the frame's delay already divided by `speed`.
    pub fn draw_frame<S: AnimationStore>(
        &mut self,
        library: &AnimationLibrary,
        index: usize,
        frame: usize,
        speed: u16,
        store: &mut S,
        fb: &mut FrameBuffer,
    ) -> Result<u32, LibraryError> {
        let entry = library.get(index).ok_or(LibraryError::FrameOutOfRange)?;
        let delay = entry.read_delay(store, frame)?;
        entry.read_frame(store, frame, &mut self.scratch)?;
        let _ = transpose_frame(&self.scratch, SCREEN_WIDTH, SCREEN_HEIGHT, fb.native_mut());
        Ok(frame_delay_ms(delay, speed))
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// When the next frame is due, if anything is playing
    pub fn next_due_ms(&self) -> Option<u64> {
        self.current.map(|_| self.next_due_ms)
    }

    /// Draw the next frame into `fb` if it is due
    ///
    /// Returns `Ok(true)` when a frame was drawn. A read error stops
    /// playback until the next [`Player::play`].
    pub fn tick<S: AnimationStore>(
        &mut self,
        now_ms: u64,
        library: &AnimationLibrary,
        store: &mut S,
        fb: &mut FrameBuffer,
    ) -> Result<bool, LibraryError> {
        let Some(index) = self.current else {
            return Ok(false);
        };
        if now_ms < self.next_due_ms {
            return Ok(false);
        }
        let Some(entry) = library.get(index) else {
            self.current = None;
            return Ok(false);
        };

        if let Err(e) = entry.read_frame(store, self.frame, &mut self.scratch) {
            self.current = None;
            return Err(e);
        }
        // Dimensions were validated when the catalogue was scanned
        let _ = transpose_frame(&self.scratch, SCREEN_WIDTH, SCREEN_HEIGHT, fb.native_mut());

        self.frame += 1;
        if self.frame >= entry.frame_count() {
            self.frame = 0;
            self.loop_count = self.loop_count.saturating_add(1);
            if self.loops_per_animation > 0 && self.loop_count >= self.loops_per_animation {
                if self.advance().is_some() {
                    return Ok(true);
                }
                self.loop_count = 0;
            }
        }

        let delay = match entry.read_delay(store, self.frame) {
            Ok(d) => d,
            Err(e) => {
                self.current = None;
                return Err(e);
            }
        };
        self.next_due_ms = now_ms + u64::from(frame_delay_ms(delay, self.speed));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::library::tests::build_library;
    use crate::codec::qgif::tests::build_qgif;
    use crate::traits::SliceStore;

    fn setup() -> alloc::vec::Vec<u8> {
        build_library(&[
            ("boot", build_qgif(&[10])),
            ("a", build_qgif(&[100, 200])),
            ("b", build_qgif(&[50])),
        ])
    }

    #[test]
    fn test_frame_timing_uses_speed_divisor() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(1, 5);

        p.play(1);
        assert_eq!(p.tick(0, &lib, &mut store, &mut fb), Ok(true));
        // Frame 1 has delay 200 / 5 = 40 ms
        assert_eq!(p.next_due_ms(), Some(40));
        assert_eq!(p.tick(39, &lib, &mut store, &mut fb), Ok(false));
        assert_eq!(p.tick(40, &lib, &mut store, &mut fb), Ok(true));
        // Wrapped to frame 0: 100 / 5 = 20 ms
        assert_eq!(p.next_due_ms(), Some(60));
    }

    #[test]
    fn test_frames_are_transposed_into_native_layout() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(1, 1);

        // Frame 0 of "a" is all zero bits, which the panel shows lit
        p.play(1);
        p.tick(0, &lib, &mut store, &mut fb).unwrap();
        assert!(fb.pixel(10, 10));
    }

    #[test]
    fn test_auto_advance_after_loops() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(3, 1);
        p.build_shuffle_bag(&lib);
        p.set_auto_advance(1);

        let first = p.advance().unwrap();
        assert_ne!(first, 0);
        let frames = lib.get(first).unwrap().frame_count();
        let mut now = 0;
        for _ in 0..frames {
            now += 1000;
            p.tick(now, &lib, &mut store, &mut fb).unwrap();
        }
        let second = p.current().unwrap();
        assert_ne!(second, first);
        assert_ne!(second, 0);
        // New animation starts immediately
        assert_eq!(p.next_due_ms(), Some(0));
    }

    #[test]
    fn test_no_auto_advance_when_disabled() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(3, 1);
        p.build_shuffle_bag(&lib);

        p.play(2);
        for t in 0..5 {
            p.tick(t * 1000, &lib, &mut store, &mut fb).unwrap();
        }
        assert_eq!(p.current(), Some(2));
    }

    #[test]
    fn test_draw_frame_at_boot_speed() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(1, 5);

        assert_eq!(p.draw_frame(&lib, 1, 1, 10, &mut store, &mut fb), Ok(20));
        assert_eq!(p.current(), None);
        assert_eq!(
            p.draw_frame(&lib, 1, 2, 10, &mut store, &mut fb),
            Err(LibraryError::FrameOutOfRange)
        );
    }

    #[test]
    fn test_idle_player_draws_nothing() {
        let archive = setup();
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();
        let mut fb = FrameBuffer::new();
        let mut p = Player::new(1, 1);
        assert_eq!(p.tick(0, &lib, &mut store, &mut fb), Ok(false));
        assert_eq!(p.next_due_ms(), None);
    }
}
