//! Frame buffer and text screens
//!
//! The frame buffer stores pixels in the panel's native page layout,
//! already rotated 180° for the way the panel is mounted. Drawing through
//! `embedded-graphics` uses upright coordinates.

pub mod frame;
pub mod qr;
pub mod screens;

pub use frame::FrameBuffer;
pub use qr::{draw_wifi_qr, wifi_payload, QrError, QrLayout};
pub use screens::{
    draw_centered, draw_lines, draw_scrolled_line, draw_time_screen, text_width, wifi_progress,
    WifiProgress, BASELINES, CHAR_WIDTH, LINE_X, WIFI_PROGRESS_CELLS,
};
