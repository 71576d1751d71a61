//! State machine definition
//!
//! What the panel shows is a function of the current state and a trigger.
//! Substates (claim phase, history index, scroll offsets) live in the
//! render runtime; only the coarse presentation mode lives here.

use super::events::GestureKind;

/// Presentation states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayState {
    /// Boot animation, played once before the loop starts
    BootAnim,
    /// No WiFi yet: connection countdown or AP portal details
    WifiSetup,
    /// Short banner with the IP address after joining WiFi
    ConnectedInfo,
    /// Shuffled animation playback (the idle state)
    GifPlayback,
    /// A poke is on screen
    PokeDisplay,
    /// Claim request waiting for a long press
    ClaimPrompt,
    /// Clock and date
    HistoryTime,
    /// One entry of the poke history ring
    HistoryPoke,
    /// Mute/unmute banner
    MuteFeedback,
    /// Declared for completeness; no trigger leads here
    OfflineStatus,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Boot animation finished
    BootComplete { link_up: bool },
    /// WiFi came up
    LinkUp,
    /// A classified touch gesture
    Gesture(GestureKind),
    /// A poke was accepted for display
    Poke,
    /// The peer asked to claim the device
    ClaimRequest,
    /// Time in state exceeded the state's timeout
    Timeout,
    /// History browsing stepped past the oldest entry
    HistoryExhausted,
    /// Claim confirmed or expired, and its banner has been shown
    ClaimResolved,
    /// Mute banner finished
    FeedbackDone { previous: DisplayState },
}

impl DisplayState {
    /// Pokes are dropped (and their bitmaps released) in modal states
    pub fn suppresses_pokes(&self) -> bool {
        matches!(self, DisplayState::ClaimPrompt | DisplayState::MuteFeedback)
    }

    /// States in which a long press toggles mute
    pub fn accepts_mute_toggle(&self) -> bool {
        !matches!(
            self,
            DisplayState::BootAnim
                | DisplayState::ClaimPrompt
                | DisplayState::MuteFeedback
                | DisplayState::OfflineStatus
        )
    }

    /// Whether the renderer's active poke survives entering this state
    pub fn keeps_active_poke(&self) -> bool {
        matches!(self, DisplayState::PokeDisplay | DisplayState::MuteFeedback)
    }

    /// Process a trigger and return the next state
    ///
    /// Unlisted pairs leave the state unchanged.
    pub fn transition(self, trigger: Trigger) -> Self {
        use DisplayState::*;
        use Trigger::*;

        match (self, trigger) {
            // Boot
            (BootAnim, BootComplete { link_up: true }) => ConnectedInfo,
            (BootAnim, BootComplete { link_up: false }) => WifiSetup,

            // WiFi setup
            (WifiSetup, LinkUp) => ConnectedInfo,

            // Connected banner
            (ConnectedInfo, Timeout) => GifPlayback,

            // Modal claim prompt
            (s, ClaimRequest) if s != BootAnim => ClaimPrompt,
            (ClaimPrompt, ClaimResolved) => GifPlayback,

            // Pokes take over any non-modal state
            (s, Poke) if s != BootAnim && !s.suppresses_pokes() => PokeDisplay,

            // Mute toggle
            (s, Gesture(GestureKind::LongPress)) if s.accepts_mute_toggle() => MuteFeedback,
            (MuteFeedback, FeedbackDone { previous }) => match previous {
                MuteFeedback | BootAnim => GifPlayback,
                other => other,
            },

            // Playback
            (GifPlayback, Gesture(GestureKind::DoubleTap)) => HistoryTime,

            // Poke display
            (PokeDisplay, Gesture(GestureKind::SingleTap)) => GifPlayback,
            (PokeDisplay, Timeout) => GifPlayback,

            // History
            (HistoryTime, Gesture(GestureKind::SingleTap)) => HistoryPoke,
            (HistoryTime, Gesture(GestureKind::DoubleTap)) => GifPlayback,
            (HistoryTime, Timeout) => GifPlayback,
            (HistoryPoke, Gesture(GestureKind::DoubleTap)) => GifPlayback,
            (HistoryPoke, HistoryExhausted) => GifPlayback,
            (HistoryPoke, Timeout) => GifPlayback,

            // Default: stay in current state
            _ => self,
        }
    }
}
