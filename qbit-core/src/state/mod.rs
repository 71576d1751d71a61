//! Display presentation state machine
//!
//! The render task owns the only instance. States are explicit and every
//! transition goes through [`DisplayState::transition`].

pub mod events;
pub mod machine;

pub use events::{
    GestureEvent, GestureKind, NetworkEvent, NetworkEventKind, RemoteCommand, MAX_SENDER_LEN,
    MAX_TEXT_LEN,
};
pub use machine::{DisplayState, Trigger};
