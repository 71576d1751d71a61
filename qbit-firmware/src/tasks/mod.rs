//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels.

pub mod input;
pub mod network;
pub mod render;

pub use input::input_task;
pub use network::{net_task, network_task, wifi_task};
pub use render::render_task;
