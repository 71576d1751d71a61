//! Piezo buzzer trait

/// Tone output for a passive piezo buzzer
///
/// Implementations drive a square wave (usually PWM). Volume is a
/// percentage and maps to duty cycle; 0 must be silent.
pub trait Buzzer {
    /// Start a tone at `freq_hz`, replacing any tone already playing
    fn tone(&mut self, freq_hz: u32, volume: u8);

    /// Stop any tone
    fn silence(&mut self);
}
