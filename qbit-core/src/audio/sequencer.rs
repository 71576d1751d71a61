//! Non-blocking melody playback

use super::rtttl::Melody;
use crate::traits::Buzzer;

/// Plays one melody at a time, one note per elapsed note duration
#[derive(Debug, Default)]
pub struct Sequencer {
    melody: Option<Melody<'static>>,
    /// Volume captured when the melody started
    volume: u8,
    note_end_ms: u64,
}

impl Sequencer {
    pub const fn new() -> Self {
        Self {
            melody: None,
            volume: 0,
            note_end_ms: 0,
        }
    }

    /// Replace whatever is playing; the first note sounds on the next tick
    pub fn start<B: Buzzer>(&mut self, buzzer: &mut B, melody: Melody<'static>, volume: u8) {
        buzzer.silence();
        self.melody = Some(melody);
        self.volume = volume;
        self.note_end_ms = 0;
    }

    pub fn stop<B: Buzzer>(&mut self, buzzer: &mut B) {
        if self.melody.take().is_some() {
            buzzer.silence();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.melody.is_some()
    }

    /// When the current note ends, if a melody is playing
    pub fn next_due_ms(&self) -> Option<u64> {
        self.melody.as_ref().map(|_| self.note_end_ms)
    }

    /// Start the next note once the current one has run its length
    pub fn tick<B: Buzzer>(&mut self, now_ms: u64, buzzer: &mut B) {
        let Some(melody) = self.melody.as_mut() else {
            return;
        };
        if now_ms < self.note_end_ms {
            return;
        }
        match melody.next() {
            Some(note) => {
                if note.freq_hz == 0 {
                    buzzer.silence();
                } else {
                    buzzer.tone(note.freq_hz, self.volume);
                }
                self.note_end_ms = now_ms + u64::from(note.duration_ms);
            }
            None => {
                buzzer.silence();
                self.melody = None;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::Tune;
    use alloc::vec::Vec;

    /// Records every buzzer call; `None` is silence
    #[derive(Debug, Default)]
    pub(crate) struct RecordingBuzzer {
        pub calls: Vec<Option<(u32, u8)>>,
    }

    impl Buzzer for RecordingBuzzer {
        fn tone(&mut self, freq_hz: u32, volume: u8) {
            self.calls.push(Some((freq_hz, volume)));
        }

        fn silence(&mut self) {
            self.calls.push(None);
        }
    }

    #[test]
    fn test_plays_notes_in_time() {
        let mut buzzer = RecordingBuzzer::default();
        let mut seq = Sequencer::new();
        // 16th notes at 200 bpm: 75 ms each
        seq.start(&mut buzzer, Tune::Mute.melody().unwrap(), 60);

        seq.tick(0, &mut buzzer);
        assert_eq!(buzzer.calls.last(), Some(&Some((784, 60))));
        seq.tick(74, &mut buzzer);
        assert_eq!(buzzer.calls.len(), 2);
        seq.tick(75, &mut buzzer);
        assert_eq!(buzzer.calls.last(), Some(&Some((523, 60))));
        seq.tick(150, &mut buzzer);
        assert_eq!(buzzer.calls.last(), Some(&None));
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_stop_silences_once() {
        let mut buzzer = RecordingBuzzer::default();
        let mut seq = Sequencer::new();
        seq.stop(&mut buzzer);
        assert!(buzzer.calls.is_empty());

        seq.start(&mut buzzer, Tune::Touch.melody().unwrap(), 100);
        seq.tick(0, &mut buzzer);
        seq.stop(&mut buzzer);
        assert_eq!(buzzer.calls.last(), Some(&None));
        assert_eq!(seq.next_due_ms(), None);
    }
}
