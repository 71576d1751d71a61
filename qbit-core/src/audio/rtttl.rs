//! RTTTL (ring tone text transfer language) parser
//!
//! `name:d=4,o=5,b=120:8c6,p,e.,g#`: a name, the defaults section and
//! comma-separated notes of the form `[duration]note[#][.][octave][.]`.
//! `p` is a pause.

/// Errors from parsing RTTTL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtttlError {
    /// Fewer than three `:`-separated sections
    MissingSection,
    /// Unknown key or out-of-range value in the defaults section
    BadDefault,
    /// A note token could not be parsed
    BadNote,
}

/// One step of a melody
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note {
    /// Zero for a pause
    pub freq_hz: u32,
    pub duration_ms: u32,
}

/// Octave 8 frequencies, C through B
const OCTAVE_8: [u32; 12] = [
    4186, 4435, 4699, 4978, 5274, 5588, 5920, 6272, 6645, 7040, 7459, 7902,
];

fn semitone(letter: u8) -> Option<usize> {
    Some(match letter.to_ascii_lowercase() {
        b'c' => 0,
        b'd' => 2,
        b'e' => 4,
        b'f' => 5,
        b'g' => 7,
        b'a' => 9,
        b'b' => 11,
        _ => return None,
    })
}

fn frequency(semitone: usize, octave: u32) -> u32 {
    OCTAVE_8[semitone % 12] >> (8 - octave)
}

/// Leading decimal digits of `s`, and the rest
fn take_number(s: &[u8]) -> (Option<u32>, &[u8]) {
    let digits = s.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return (None, s);
    }
    let value = s[..digits]
        .iter()
        .fold(0u32, |acc, c| acc.saturating_mul(10).saturating_add(u32::from(c - b'0')));
    (Some(value), &s[digits..])
}

/// A validated melody; iterating yields its notes
#[derive(Debug, Clone)]
pub struct Melody<'a> {
    notes: core::str::Split<'a, char>,
    duration: u32,
    octave: u32,
    whole_ms: u32,
}

impl<'a> Melody<'a> {
    /// Parse the header and validate every note
    pub fn parse(text: &'a str) -> Result<Self, RtttlError> {
        let mut sections = text.splitn(3, ':');
        let _name = sections.next().ok_or(RtttlError::MissingSection)?;
        let defaults = sections.next().ok_or(RtttlError::MissingSection)?;
        let notes = sections.next().ok_or(RtttlError::MissingSection)?;

        let mut duration = 4;
        let mut octave = 6;
        let mut bpm = 63;
        for item in defaults.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item.split_once('=').ok_or(RtttlError::BadDefault)?;
            let value: u32 = value.trim().parse().map_err(|_| RtttlError::BadDefault)?;
            match key.trim() {
                "d" => duration = value,
                "o" => octave = value,
                "b" => bpm = value,
                _ => return Err(RtttlError::BadDefault),
            }
        }
        if duration == 0 || !(1..=8).contains(&octave) || bpm == 0 {
            return Err(RtttlError::BadDefault);
        }

        let melody = Self {
            notes: notes.split(','),
            duration,
            octave,
            whole_ms: 240_000 / bpm,
        };
        for token in melody.notes.clone() {
            melody.note(token)?;
        }
        Ok(melody)
    }

    fn note(&self, token: &str) -> Result<Note, RtttlError> {
        let s = token.trim().as_bytes();

        let (duration, s) = take_number(s);
        let duration = duration.unwrap_or(self.duration);
        if duration == 0 {
            return Err(RtttlError::BadNote);
        }

        let (&letter, mut s) = s.split_first().ok_or(RtttlError::BadNote)?;
        let pause = letter.eq_ignore_ascii_case(&b'p');
        let mut tone = if pause {
            0
        } else {
            semitone(letter).ok_or(RtttlError::BadNote)?
        };

        if let Some((b'#', rest)) = s.split_first() {
            tone += 1;
            s = rest;
        }
        let mut dotted = false;
        if let Some((b'.', rest)) = s.split_first() {
            dotted = true;
            s = rest;
        }
        let (octave, mut s) = take_number(s);
        let octave = octave.unwrap_or(self.octave);
        if let Some((b'.', rest)) = s.split_first() {
            dotted = true;
            s = rest;
        }
        if !s.is_empty() || !(1..=8).contains(&octave) {
            return Err(RtttlError::BadNote);
        }

        let mut duration_ms = self.whole_ms / duration;
        if dotted {
            duration_ms += duration_ms / 2;
        }
        let freq_hz = if pause {
            0
        } else {
            // B# rolls over into the next octave
            frequency(tone, octave) << (tone / 12)
        };
        Ok(Note {
            freq_hz,
            duration_ms,
        })
    }
}

impl Iterator for Melody<'_> {
    type Item = Note;

    fn next(&mut self) -> Option<Note> {
        loop {
            let token = self.notes.next()?;
            if let Ok(note) = self.note(token) {
                return Some(note);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_defaults_and_notes() {
        let notes: Vec<Note> = Melody::parse("t:d=4,o=5,b=120:c,8p,a6,2e.")
            .unwrap()
            .collect();
        // Whole note at 120 bpm is 2000 ms
        assert_eq!(notes[0], Note { freq_hz: 523, duration_ms: 500 });
        assert_eq!(notes[1], Note { freq_hz: 0, duration_ms: 250 });
        assert_eq!(notes[2], Note { freq_hz: 1760, duration_ms: 500 });
        assert_eq!(notes[3], Note { freq_hz: 659, duration_ms: 1500 });
    }

    #[test]
    fn test_sharps_and_explicit_octave() {
        let notes: Vec<Note> = Melody::parse("x:d=16,o=5,b=600:b5,e6,c#7")
            .unwrap()
            .collect();
        assert_eq!(notes[0].freq_hz, 987);
        assert_eq!(notes[1].freq_hz, 1318);
        assert_eq!(notes[2].freq_hz, 2217);
        assert_eq!(notes[0].duration_ms, 25);
    }

    #[test]
    fn test_errors() {
        assert_eq!(Melody::parse("nothing").err(), Some(RtttlError::MissingSection));
        assert_eq!(Melody::parse("x:d=4,q=1:c").err(), Some(RtttlError::BadDefault));
        assert_eq!(Melody::parse("x:b=0:c").err(), Some(RtttlError::BadDefault));
        assert_eq!(Melody::parse("x:d=4:h").err(), Some(RtttlError::BadNote));
        assert_eq!(Melody::parse("x:d=4:c9").err(), Some(RtttlError::BadNote));
    }
}
