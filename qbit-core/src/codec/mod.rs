//! Frame codec and the `.qgif` animation container
//!
//! Animation frames are authored row-major, one bit per pixel, MSB first.
//! The panel wants vertical 8-pixel pages with the image rotated 180°
//! and inverted; [`transpose_frame`] does both in a single pass.

pub(crate) mod qgif;
mod transpose;

pub use qgif::{Qgif, QgifError, QgifHeader, QGIF_HEADER_SIZE};
pub use transpose::{frame_delay_ms, transpose_frame, CodecError};

/// Panel width in pixels
pub const SCREEN_WIDTH: usize = 128;

/// Panel height in pixels
pub const SCREEN_HEIGHT: usize = 64;

/// Number of 8-pixel pages on the panel
pub const SCREEN_PAGES: usize = SCREEN_HEIGHT / 8;

/// Bytes in one full-screen frame (source or native layout)
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;
