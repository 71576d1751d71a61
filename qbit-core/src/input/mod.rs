//! Touch input

pub mod gesture;

pub use gesture::{GestureDetector, DOUBLE_TAP_WINDOW_MS, LONG_PRESS_MS, POLL_INTERVAL_MS};
