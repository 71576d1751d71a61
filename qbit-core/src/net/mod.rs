//! Connectivity state shared between the network and render tasks
//!
//! [`ConnectivityFlags`] is written only by the network task and read by
//! the render task. [`ConnectivityManager`] is the network task's pure
//! decision logic: it turns observations into actions and events.

pub mod flags;
pub mod manager;

pub use flags::{ConnectivityFlags, ConnectivitySnapshot, Flag};
pub use manager::{
    Action, Actions, ConnectivityManager, Observation, AP_FALLBACK_MS, HA_SENDER,
    POKE_TEXT_SET_MAX, RETRY_INTERVAL_MS,
};
