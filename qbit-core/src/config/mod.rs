//! Device settings
//!
//! Board-agnostic settings types. The firmware fills a [`DeviceSettings`]
//! from its embedded `device.toml` with [`parse_settings`]; everything else
//! reads settings through the [`Settings`] trait.

pub mod settings;
pub mod toml;

pub use settings::*;
pub use toml::{parse_settings, ParseError};
