//! Board-agnostic runtime logic for the QBIT companion display
//!
//! This crate contains everything that does not depend on the RP2040 or
//! the WiFi chip:
//!
//! - Frame codec (animation bitplane to display pages)
//! - Animation library, shuffle bag and player
//! - Frame buffer and text screens
//! - Poke bitmaps, scrolling and the history ring
//! - Display presentation state machine and the render runtime
//! - Touch gesture detection and RTTTL melodies
//! - Connectivity manager (sans-IO) and the shared connectivity flags
//! - Settings types, civil time formatting and time zone rules

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod animation;
pub mod audio;
pub mod clock;
pub mod codec;
pub mod config;
pub mod display;
pub mod input;
pub mod net;
pub mod poke;
pub mod runtime;
pub mod state;
pub mod timezone;
pub mod traits;

/// Firmware version reported to the peer and to Home Assistant
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
