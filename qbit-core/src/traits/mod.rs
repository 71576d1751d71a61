//! Hardware and collaborator abstraction traits
//!
//! These traits define the interface between the render runtime and the
//! board-specific implementations in the firmware crate.

pub mod buzzer;
pub mod outbox;
pub mod panel;
pub mod storage;

pub use buzzer::Buzzer;
pub use outbox::{OutboundEvent, Outbox, MAX_ANIMATION_NAME};
pub use panel::{DisplayError, Panel};
pub use storage::{AnimationStore, SliceStore, StoreError};
