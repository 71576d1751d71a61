//! Touch pad gesture recognition
//!
//! The detector is fed one pin sample per poll and reports at most one
//! gesture per sample:
//!
//! - press: `TouchDown` immediately
//! - held for `LONG_PRESS_MS`: `LongPress` while still held
//! - released after less than `DOUBLE_TAP_WINDOW_MS`: wait up to
//!   `DOUBLE_TAP_WINDOW_MS` for a second press (`DoubleTap`), otherwise
//!   `SingleTap`
//! - released later than that: `SingleTap`

use crate::state::{GestureEvent, GestureKind};

/// Hold time that makes a press a long press
pub const LONG_PRESS_MS: u64 = 1500;

/// Maximum press length and gap for a double tap
pub const DOUBLE_TAP_WINDOW_MS: u64 = 300;

/// Pin sampling period
pub const POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum TouchState {
    Idle,
    Touched { down_ms: u64 },
    WaitSecondTap { release_ms: u64 },
    /// A gesture already fired; ignore the pad until it is released
    WaitRelease,
}

/// Sans-IO gesture state machine
#[derive(Debug, Clone, Copy)]
pub struct GestureDetector {
    state: TouchState,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureDetector {
    pub const fn new() -> Self {
        Self {
            state: TouchState::Idle,
        }
    }

    /// Feed one sample of the touch pin (`true` = touched)
    pub fn poll(&mut self, pressed: bool, now_ms: u64) -> Option<GestureEvent> {
        let (next, kind) = match (self.state, pressed) {
            (TouchState::Idle, true) => (
                TouchState::Touched { down_ms: now_ms },
                Some(GestureKind::TouchDown),
            ),
            (TouchState::Idle, false) => (TouchState::Idle, None),

            (TouchState::Touched { down_ms }, true) => {
                if now_ms.saturating_sub(down_ms) >= LONG_PRESS_MS {
                    (TouchState::WaitRelease, Some(GestureKind::LongPress))
                } else {
                    (self.state, None)
                }
            }
            (TouchState::Touched { down_ms }, false) => {
                if now_ms.saturating_sub(down_ms) < DOUBLE_TAP_WINDOW_MS {
                    (TouchState::WaitSecondTap { release_ms: now_ms }, None)
                } else {
                    (TouchState::Idle, Some(GestureKind::SingleTap))
                }
            }

            (TouchState::WaitSecondTap { .. }, true) => {
                (TouchState::WaitRelease, Some(GestureKind::DoubleTap))
            }
            (TouchState::WaitSecondTap { release_ms }, false) => {
                if now_ms.saturating_sub(release_ms) >= DOUBLE_TAP_WINDOW_MS {
                    (TouchState::Idle, Some(GestureKind::SingleTap))
                } else {
                    (self.state, None)
                }
            }

            (TouchState::WaitRelease, true) => (TouchState::WaitRelease, None),
            (TouchState::WaitRelease, false) => (TouchState::Idle, None),
        };

        self.state = next;
        kind.map(|k| GestureEvent::new(k, now_ms))
    }
}
