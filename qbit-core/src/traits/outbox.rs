//! Render-to-network publication channel

use heapless::String;

use crate::state::GestureKind;

/// Maximum animation name carried in an outbound event
pub const MAX_ANIMATION_NAME: usize = 32;

/// Something the render context wants the network task to publish
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutboundEvent {
    /// Socket `claim_confirm`
    ClaimConfirm,
    /// Socket `claim_reject`
    ClaimReject,
    /// `/mute/state` ON when true
    MuteState(bool),
    /// `/touch` with the gesture name
    Touch(GestureKind),
    /// `/animation/state` with the animation name
    AnimationState(String<MAX_ANIMATION_NAME>),
}

/// Sink for outbound events
///
/// The firmware implementation pushes onto a bounded channel with
/// `try_send`; a full channel drops the event.
pub trait Outbox {
    fn post(&mut self, event: OutboundEvent);
}
