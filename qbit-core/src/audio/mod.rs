//! Buzzer melodies
//!
//! Melodies are RTTTL strings parsed lazily into tone steps and played by
//! a non-blocking [`Sequencer`] advanced once per render tick.

pub mod melodies;
pub mod rtttl;
pub mod sequencer;

pub use melodies::Tune;
pub use rtttl::{Melody, Note, RtttlError};
pub use sequencer::Sequencer;
