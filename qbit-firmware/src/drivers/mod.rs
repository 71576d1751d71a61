//! Board drivers
//!
//! Implementations of the `qbit-core` hardware traits for the Pico W.

pub mod buzzer;
pub mod flash_store;
pub mod ssd1306;

pub use buzzer::PwmBuzzer;
pub use flash_store::FlashStore;
pub use ssd1306::Ssd1306;
