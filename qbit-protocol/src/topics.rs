//! MQTT topic naming
//!
//! Every device topic lives under `<prefix>/<device id>/`.

use alloc::format;
use alloc::string::String;

/// Topic suffixes published by the device
pub const STATUS: &str = "status";
pub const INFO: &str = "info";
pub const POKE: &str = "poke";
pub const MUTE_STATE: &str = "mute/state";
pub const TOUCH: &str = "touch";
pub const ANIMATION_STATE: &str = "animation/state";

/// Topic suffixes the device subscribes to
pub const COMMAND: &str = "command";
pub const POKE_TEXT_SET: &str = "poke_text/set";
pub const MUTE_SET: &str = "mute/set";
pub const ANIMATION_NEXT: &str = "animation/next";

/// Payloads of the retained status topic
pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Inbound topics the device acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subscription {
    /// JSON command (`{"command":"poke",...}`)
    Command,
    /// Plain-text poke message from Home Assistant
    PokeTextSet,
    /// `ON` / `OFF`
    MuteSet,
    /// Skip to the next animation
    AnimationNext,
}

impl Subscription {
    /// All subscriptions, in the order they are requested
    pub const ALL: [Subscription; 4] = [
        Subscription::Command,
        Subscription::PokeTextSet,
        Subscription::MuteSet,
        Subscription::AnimationNext,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Subscription::Command => COMMAND,
            Subscription::PokeTextSet => POKE_TEXT_SET,
            Subscription::MuteSet => MUTE_SET,
            Subscription::AnimationNext => ANIMATION_NEXT,
        }
    }
}

/// Topic builder for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    /// Create the topic set for `prefix` and `device_id`
    pub fn new(prefix: &str, device_id: &str) -> Self {
        Self {
            base: format!("{}/{}", prefix, device_id),
        }
    }

    /// Full topic for a suffix
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.base, suffix)
    }

    /// Full topic for a subscription
    pub fn subscription(&self, sub: Subscription) -> String {
        self.topic(sub.suffix())
    }

    /// Match an inbound topic against the subscriptions
    pub fn classify(&self, topic: &str) -> Option<Subscription> {
        let rest = topic.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        Subscription::ALL.into_iter().find(|s| s.suffix() == rest)
    }
}
