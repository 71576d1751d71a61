//! Animation library, shuffle bag and frame player
//!
//! Animations live in one packed archive (see [`library`]). The player
//! streams one frame at a time from the store into the frame buffer, so
//! only a single 1 KiB scratch frame is ever held in RAM.

pub mod library;
pub mod player;
pub mod shuffle;

pub use library::{
    AnimationEntry, AnimationLibrary, LibraryError, BOOT_ANIMATION, LIBRARY_MAGIC, MAX_ANIMATIONS,
};
pub use player::Player;
pub use shuffle::{Rng, ShuffleBag};
