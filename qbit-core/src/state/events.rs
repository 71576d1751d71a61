//! Events flowing into the render task

use heapless::String;

use crate::poke::PokeBitmaps;

/// Maximum sender name carried by an event
pub const MAX_SENDER_LEN: usize = 32;

/// Maximum message text carried by an event
pub const MAX_TEXT_LEN: usize = 64;

/// Touch gesture classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GestureKind {
    None,
    /// Pad pressed (emitted before the gesture is classified)
    TouchDown,
    SingleTap,
    DoubleTap,
    LongPress,
}

impl GestureKind {
    /// Name published on the `/touch` topic
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::SingleTap => "single_tap",
            GestureKind::DoubleTap => "double_tap",
            GestureKind::LongPress => "long_press",
            GestureKind::None | GestureKind::TouchDown => "none",
        }
    }

    /// Whether this is a completed gesture (published), not a raw press
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            GestureKind::SingleTap | GestureKind::DoubleTap | GestureKind::LongPress
        )
    }
}

/// A gesture produced by the input task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GestureEvent {
    pub kind: GestureKind,
    /// Uptime in milliseconds when the gesture was recognised
    pub timestamp_ms: u64,
}

impl GestureEvent {
    pub fn new(kind: GestureKind, timestamp_ms: u64) -> Self {
        Self { kind, timestamp_ms }
    }
}

/// Remote control commands received over pub/sub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteCommand {
    /// `/mute/set` ON (true) or OFF (false)
    Mute(bool),
    /// `/animation/next`
    NextAnimation,
}

/// An event produced by the network task
///
/// `PokeBitmap` owns its decoded bitmaps. Sending the event moves them to
/// the render task; dropping the event anywhere releases them.
#[derive(Debug)]
pub enum NetworkEvent {
    Poke {
        sender: String<MAX_SENDER_LEN>,
        text: String<MAX_TEXT_LEN>,
    },
    PokeBitmap {
        sender: String<MAX_SENDER_LEN>,
        text: String<MAX_TEXT_LEN>,
        bitmaps: PokeBitmaps,
    },
    ClaimRequest {
        user_name: String<MAX_SENDER_LEN>,
    },
    /// WiFi link up or down
    WifiStatus { connected: bool },
    /// Socket connection to the peer opened or closed
    LinkStatus { connected: bool },
    Command(RemoteCommand),
}

/// Payload-free discriminant, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkEventKind {
    Poke,
    PokeBitmap,
    ClaimRequest,
    WifiStatus,
    LinkStatus,
    Command,
}

impl NetworkEvent {
    pub fn kind(&self) -> NetworkEventKind {
        match self {
            NetworkEvent::Poke { .. } => NetworkEventKind::Poke,
            NetworkEvent::PokeBitmap { .. } => NetworkEventKind::PokeBitmap,
            NetworkEvent::ClaimRequest { .. } => NetworkEventKind::ClaimRequest,
            NetworkEvent::WifiStatus { .. } => NetworkEventKind::WifiStatus,
            NetworkEvent::LinkStatus { .. } => NetworkEventKind::LinkStatus,
            NetworkEvent::Command(_) => NetworkEventKind::Command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_names() {
        assert_eq!(GestureKind::SingleTap.as_str(), "single_tap");
        assert_eq!(GestureKind::DoubleTap.as_str(), "double_tap");
        assert_eq!(GestureKind::LongPress.as_str(), "long_press");
        assert!(!GestureKind::TouchDown.is_final());
        assert!(GestureKind::LongPress.is_final());
    }

    #[test]
    fn test_event_kind() {
        let evt = NetworkEvent::WifiStatus { connected: true };
        assert_eq!(evt.kind(), NetworkEventKind::WifiStatus);
        let evt = NetworkEvent::Command(RemoteCommand::NextAnimation);
        assert_eq!(evt.kind(), NetworkEventKind::Command);
    }
}
