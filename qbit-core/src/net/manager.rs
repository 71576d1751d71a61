//! Connection supervision without I/O
//!
//! The network task feeds the manager what it observed (link state, socket
//! and broker sessions opening or closing, inbound messages) together with
//! the current uptime. The manager keeps the connectivity flags current and
//! answers with [`Action`]s for the task to carry out.

use heapless::{String, Vec};
use qbit_protocol::message::{DEFAULT_CLAIM_USER, DEFAULT_POKE_TEXT};
use qbit_protocol::{CommandPayload, InboundMessage, Subscription, Topics};

use super::flags::{ConnectivityFlags, Flag};
use crate::poke::{bounded, PokeBitmaps};
use crate::state::{NetworkEvent, RemoteCommand, MAX_SENDER_LEN, MAX_TEXT_LEN};
use crate::timezone::ZoneId;

/// Interval between socket or broker connection attempts
pub const RETRY_INTERVAL_MS: u64 = 5000;

/// Link loss after which the setup access point is started
pub const AP_FALLBACK_MS: u64 = 15_000;

/// Sender shown for pokes typed into Home Assistant
pub const HA_SENDER: &str = "Home Assistant";

/// Characters kept from a `/poke_text/set` payload
pub const POKE_TEXT_SET_MAX: usize = 25;

/// Something the network task saw happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Observation {
    /// Station is associated and has an address
    LinkUp { ip: [u8; 4] },
    LinkDown,
    SocketOpened,
    /// Socket closed, or a connection attempt failed
    SocketClosed,
    BrokerConnected,
    /// Broker session lost, or a connection attempt failed
    BrokerLost,
    /// Zone lookup by public address succeeded
    ZoneDetected(ZoneId),
}

/// Work for the network task
#[derive(Debug)]
pub enum Action {
    /// Forward to the render task
    Emit(NetworkEvent),
    StartPortal,
    StopPortal,
    ConnectSocket,
    CloseSocket,
    ConnectBroker,
    CloseBroker,
    /// Look up the zone of the public address, once per boot
    DetectTimeZone,
    /// Publish the retained `/poke` record
    PublishPoke {
        sender: String<MAX_SENDER_LEN>,
        text: String<MAX_TEXT_LEN>,
    },
}

/// Actions produced by one call
pub type Actions = Vec<Action, 6>;

fn push(actions: &mut Actions, action: Action) {
    // Every call produces fewer actions than the capacity
    let _ = actions.push(action);
}

/// Link, socket and broker supervision state
#[derive(Debug, Clone)]
pub struct ConnectivityManager {
    has_credentials: bool,
    socket_enabled: bool,
    broker_enabled: bool,
    link_up: bool,
    socket_up: bool,
    broker_up: bool,
    /// Uptime when the link loss was detected, at least 1
    link_lost_ms: Option<u64>,
    portal_active: bool,
    last_socket_attempt_ms: Option<u64>,
    last_broker_attempt_ms: Option<u64>,
    /// Zone lookup still to run on the next link up
    detect_zone: bool,
}

impl ConnectivityManager {
    pub fn new(has_credentials: bool, socket_enabled: bool, broker_enabled: bool) -> Self {
        Self {
            has_credentials,
            socket_enabled,
            broker_enabled,
            link_up: false,
            socket_up: false,
            broker_up: false,
            link_lost_ms: None,
            portal_active: false,
            last_socket_attempt_ms: None,
            last_broker_attempt_ms: None,
            detect_zone: false,
        }
    }

    /// Look up the time zone the first time the link comes up
    pub fn with_zone_detection(mut self, enabled: bool) -> Self {
        self.detect_zone = enabled;
        self
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn socket_up(&self) -> bool {
        self.socket_up
    }

    pub fn broker_up(&self) -> bool {
        self.broker_up
    }

    pub fn portal_active(&self) -> bool {
        self.portal_active
    }

    pub fn link_lost_ms(&self) -> Option<u64> {
        self.link_lost_ms
    }

    /// Apply an observation
    ///
    /// Repeated observations of the same state are harmless, so the task
    /// may report the link status on every loop iteration.
    pub fn observe(&mut self, obs: Observation, now_ms: u64, flags: &ConnectivityFlags) -> Actions {
        let mut actions = Actions::new();
        match obs {
            Observation::LinkUp { ip } => {
                if !self.link_up {
                    self.link_up = true;
                    flags.set_ip(Some(ip));
                    flags.set(Flag::Wifi);
                    push(
                        &mut actions,
                        Action::Emit(NetworkEvent::WifiStatus { connected: true }),
                    );
                    if core::mem::take(&mut self.detect_zone) {
                        push(&mut actions, Action::DetectTimeZone);
                    }
                }
                if self.portal_active {
                    self.portal_active = false;
                    flags.clear(Flag::Portal);
                    push(&mut actions, Action::StopPortal);
                }
                if self.link_lost_ms.take().is_some() {
                    flags.set_link_lost(None);
                }
            }
            Observation::LinkDown => {
                if self.link_lost_ms.is_none() {
                    self.link_lost_ms = Some(now_ms.max(1));
                    flags.set_link_lost(self.link_lost_ms);
                    let was_up = self.link_up;
                    self.link_up = false;
                    flags.clear(Flag::Wifi);
                    flags.set_ip(None);
                    if self.socket_up {
                        self.socket_up = false;
                        flags.clear(Flag::Socket);
                        push(&mut actions, Action::CloseSocket);
                    }
                    if self.broker_up {
                        self.broker_up = false;
                        flags.clear(Flag::Broker);
                        push(&mut actions, Action::CloseBroker);
                    }
                    if was_up {
                        push(
                            &mut actions,
                            Action::Emit(NetworkEvent::WifiStatus { connected: false }),
                        );
                    }
                }
            }
            Observation::SocketOpened => {
                if !self.socket_up {
                    self.socket_up = true;
                    flags.set(Flag::Socket);
                    push(
                        &mut actions,
                        Action::Emit(NetworkEvent::LinkStatus { connected: true }),
                    );
                }
            }
            Observation::SocketClosed => {
                if self.socket_up {
                    self.socket_up = false;
                    flags.clear(Flag::Socket);
                    push(
                        &mut actions,
                        Action::Emit(NetworkEvent::LinkStatus { connected: false }),
                    );
                }
            }
            Observation::BrokerConnected => {
                self.broker_up = true;
                flags.set(Flag::Broker);
            }
            Observation::BrokerLost => {
                self.broker_up = false;
                flags.clear(Flag::Broker);
            }
            Observation::ZoneDetected(zone) => flags.set_zone(Some(zone)),
        }
        actions
    }

    /// Run the timers: AP fallback and connection retries
    pub fn poll(&mut self, now_ms: u64, flags: &ConnectivityFlags) -> Actions {
        let mut actions = Actions::new();

        if !self.link_up {
            let expired = match self.link_lost_ms {
                Some(lost) => now_ms.saturating_sub(lost) >= AP_FALLBACK_MS,
                None => false,
            };
            if !self.portal_active && (expired || !self.has_credentials) {
                self.portal_active = true;
                flags.set(Flag::Portal);
                push(&mut actions, Action::StartPortal);
            }
            return actions;
        }

        if self.socket_enabled && !self.socket_up && due(self.last_socket_attempt_ms, now_ms) {
            self.last_socket_attempt_ms = Some(now_ms);
            push(&mut actions, Action::ConnectSocket);
        }
        if self.broker_enabled && !self.broker_up && due(self.last_broker_attempt_ms, now_ms) {
            self.last_broker_attempt_ms = Some(now_ms);
            push(&mut actions, Action::ConnectBroker);
        }
        actions
    }

    /// Handle a text message from the device socket
    ///
    /// Malformed and unknown messages produce nothing. A poke whose bitmaps
    /// fail to decode is downgraded to a text poke.
    pub fn handle_socket_text(&mut self, text: &str) -> Actions {
        let mut actions = Actions::new();
        match InboundMessage::parse(text) {
            Ok(InboundMessage::Poke(msg)) => {
                let sender = bounded(msg.sender_or_default());
                let text = bounded(msg.text_or_default());
                let bitmaps = msg
                    .bitmap_fields()
                    .and_then(|fields| PokeBitmaps::decode(&fields).ok());
                let event = match bitmaps {
                    Some(bitmaps) => NetworkEvent::PokeBitmap {
                        sender: sender.clone(),
                        text: text.clone(),
                        bitmaps,
                    },
                    None => NetworkEvent::Poke {
                        sender: sender.clone(),
                        text: text.clone(),
                    },
                };
                push(&mut actions, Action::Emit(event));
                push(&mut actions, Action::PublishPoke { sender, text });
            }
            Ok(InboundMessage::ClaimRequest { user_name }) => {
                let name = user_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_CLAIM_USER);
                push(
                    &mut actions,
                    Action::Emit(NetworkEvent::ClaimRequest {
                        user_name: bounded(name),
                    }),
                );
            }
            Ok(InboundMessage::Unknown) | Err(_) => {}
        }
        actions
    }

    /// Handle a PUBLISH received from the broker
    pub fn handle_broker_message(&mut self, topics: &Topics, topic: &str, payload: &[u8]) -> Actions {
        let mut actions = Actions::new();
        let Some(sub) = topics.classify(topic) else {
            return actions;
        };

        match sub {
            Subscription::Command => {
                let Ok(cmd) = CommandPayload::parse(payload) else {
                    return actions;
                };
                if cmd.command == "poke" {
                    let sender = bounded(cmd.sender_or_default());
                    let text = bounded(cmd.text_or_default());
                    push(
                        &mut actions,
                        Action::Emit(NetworkEvent::Poke {
                            sender: sender.clone(),
                            text: text.clone(),
                        }),
                    );
                    push(&mut actions, Action::PublishPoke { sender, text });
                }
            }
            Subscription::PokeTextSet => {
                let Ok(raw) = core::str::from_utf8(payload) else {
                    return actions;
                };
                let raw = raw.trim();
                let mut text: String<MAX_TEXT_LEN> = String::new();
                for c in raw.chars().take(POKE_TEXT_SET_MAX) {
                    let _ = text.push(c);
                }
                if text.is_empty() {
                    let _ = text.push_str(DEFAULT_POKE_TEXT);
                }
                let sender = bounded(HA_SENDER);
                push(
                    &mut actions,
                    Action::Emit(NetworkEvent::Poke {
                        sender: sender.clone(),
                        text: text.clone(),
                    }),
                );
                push(&mut actions, Action::PublishPoke { sender, text });
            }
            Subscription::MuteSet => {
                push(
                    &mut actions,
                    Action::Emit(NetworkEvent::Command(RemoteCommand::Mute(payload == b"ON"))),
                );
            }
            Subscription::AnimationNext => {
                push(
                    &mut actions,
                    Action::Emit(NetworkEvent::Command(RemoteCommand::NextAnimation)),
                );
            }
        }
        actions
    }
}

fn due(last: Option<u64>, now_ms: u64) -> bool {
    match last {
        Some(t) => now_ms.saturating_sub(t) >= RETRY_INTERVAL_MS,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poke::bitmap::live_bitmaps;
    use alloc::format;
    use alloc::string::String as StdString;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    const IP: [u8; 4] = [10, 0, 0, 7];

    fn connected() -> (ConnectivityManager, ConnectivityFlags) {
        let mut m = ConnectivityManager::new(true, true, true);
        let f = ConnectivityFlags::new();
        m.observe(Observation::LinkUp { ip: IP }, 100, &f);
        (m, f)
    }

    fn emitted(actions: &Actions) -> Option<&NetworkEvent> {
        actions.iter().find_map(|a| match a {
            Action::Emit(e) => Some(e),
            _ => None,
        })
    }

    #[test]
    fn test_link_up_is_idempotent() {
        let (mut m, f) = connected();
        assert!(f.snapshot().wifi_up);
        assert_eq!(f.snapshot().ip, Some(IP));
        assert!(m.observe(Observation::LinkUp { ip: IP }, 200, &f).is_empty());
    }

    #[test]
    fn test_link_loss_countdown_and_portal() {
        let (mut m, f) = connected();
        let a = m.observe(Observation::LinkDown, 0, &f);
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::WifiStatus { connected: false })
        ));
        // Loss at uptime 0 is still recorded as a real timestamp
        assert_eq!(m.link_lost_ms(), Some(1));
        assert_eq!(f.snapshot().link_lost_ms, Some(1));

        // Repeated reports do not restart the countdown
        assert!(m.observe(Observation::LinkDown, 5_000, &f).is_empty());
        assert!(m.poll(15_000, &f).is_empty());
        let a = m.poll(15_001, &f);
        assert!(matches!(a.as_slice(), [Action::StartPortal]));
        assert!(f.snapshot().portal_active);
        assert!(m.poll(20_000, &f).is_empty());

        let a = m.observe(Observation::LinkUp { ip: IP }, 21_000, &f);
        assert!(a.iter().any(|x| matches!(x, Action::StopPortal)));
        let s = f.snapshot();
        assert!(s.wifi_up && !s.portal_active);
        assert_eq!(s.link_lost_ms, None);
    }

    #[test]
    fn test_zone_detection_runs_once() {
        let mut m = ConnectivityManager::new(true, true, false).with_zone_detection(true);
        let f = ConnectivityFlags::new();
        let a = m.observe(Observation::LinkUp { ip: IP }, 100, &f);
        assert!(a.iter().any(|x| matches!(x, Action::DetectTimeZone)));

        m.observe(Observation::LinkDown, 200, &f);
        let a = m.observe(Observation::LinkUp { ip: IP }, 300, &f);
        assert!(!a.iter().any(|x| matches!(x, Action::DetectTimeZone)));

        let zone = ZoneId::from_iana("Asia/Tokyo").unwrap();
        assert!(m.observe(Observation::ZoneDetected(zone), 400, &f).is_empty());
        assert_eq!(f.snapshot().zone, Some(zone));

        // A configured zone skips the lookup
        let (mut m, f) = connected();
        m.observe(Observation::LinkDown, 500, &f);
        let a = m.observe(Observation::LinkUp { ip: IP }, 600, &f);
        assert!(!a.iter().any(|x| matches!(x, Action::DetectTimeZone)));
    }

    #[test]
    fn test_no_credentials_starts_portal_at_once() {
        let mut m = ConnectivityManager::new(false, true, false);
        let f = ConnectivityFlags::new();
        assert!(matches!(m.poll(0, &f).as_slice(), [Action::StartPortal]));
    }

    #[test]
    fn test_fixed_interval_retries() {
        let (mut m, f) = connected();
        let a = m.poll(1_000, &f);
        assert!(matches!(a.as_slice(), [Action::ConnectSocket, Action::ConnectBroker]));

        m.observe(Observation::SocketClosed, 1_500, &f);
        assert!(m.poll(5_999, &f).is_empty());
        let a = m.poll(6_000, &f);
        assert_eq!(a.len(), 2);

        m.observe(Observation::SocketOpened, 6_100, &f);
        m.observe(Observation::BrokerConnected, 6_100, &f);
        assert!(m.poll(20_000, &f).is_empty());
    }

    #[test]
    fn test_socket_status_events() {
        let (mut m, f) = connected();
        let a = m.observe(Observation::SocketOpened, 0, &f);
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::LinkStatus { connected: true })
        ));
        assert!(f.snapshot().socket_up);

        let a = m.observe(Observation::SocketClosed, 0, &f);
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::LinkStatus { connected: false })
        ));
        // A failed attempt while already down reports nothing
        assert!(m.observe(Observation::SocketClosed, 0, &f).is_empty());
    }

    #[test]
    fn test_text_poke_publishes() {
        let (mut m, _) = connected();
        let a = m.handle_socket_text(r#"{"type":"poke","sender":"Ana","text":"hi"}"#);
        match emitted(&a) {
            Some(NetworkEvent::Poke { sender, text }) => {
                assert_eq!(sender.as_str(), "Ana");
                assert_eq!(text.as_str(), "hi");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(a.iter().any(|x| matches!(x, Action::PublishPoke { .. })));
    }

    #[test]
    fn test_bitmap_poke_decodes() {
        let (mut m, _) = connected();
        let sender = STANDARD.encode([0xFFu8; 40]);
        let text = STANDARD.encode([0x0Fu8; 300]);
        let msg = format!(
            r#"{{"type":"poke","sender":"Ana","text":"hi","senderBitmap":"{}","senderBitmapWidth":40,"textBitmap":"{}","textBitmapWidth":300}}"#,
            sender, text
        );
        let before = live_bitmaps();
        let a = m.handle_socket_text(&msg);
        match emitted(&a) {
            Some(NetworkEvent::PokeBitmap { bitmaps, .. }) => {
                assert_eq!(bitmaps.sender.width(), 40);
                assert_eq!(bitmaps.text.width(), 300);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(live_bitmaps(), before + 2);
        drop(a);
        assert_eq!(live_bitmaps(), before);
    }

    #[test]
    fn test_oversized_bitmap_falls_back_to_text() {
        let (mut m, _) = connected();
        let huge: StdString = "A".repeat(9000);
        let msg = format!(
            r#"{{"type":"poke","sender":"Ana","text":"hi","senderBitmap":"{}","senderBitmapWidth":40,"textBitmap":"AAAA","textBitmapWidth":3}}"#,
            huge
        );
        let before = live_bitmaps();
        let a = m.handle_socket_text(&msg);
        assert_eq!(live_bitmaps(), before);
        match emitted(&a) {
            Some(NetworkEvent::Poke { sender, text }) => {
                assert_eq!(sender.as_str(), "Ana");
                assert_eq!(text.as_str(), "hi");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mistyped_bitmap_fields_fall_back_to_text() {
        let (mut m, _) = connected();
        let cases = [
            r#""senderBitmap":"AAAA","senderBitmapWidth":-1"#,
            r#""senderBitmap":"AAAA","senderBitmapWidth":99999999999"#,
            r#""senderBitmap":"AAAA","senderBitmapWidth":"3""#,
            r#""senderBitmap":"AAAA","senderBitmapWidth":3.5"#,
            r#""senderBitmap":123,"senderBitmapWidth":3"#,
        ];
        for fields in cases {
            let msg = format!(
                r#"{{"type":"poke","sender":"Ana","text":"hi",{},"textBitmap":"AAAA","textBitmapWidth":3}}"#,
                fields
            );
            let a = m.handle_socket_text(&msg);
            match emitted(&a) {
                Some(NetworkEvent::Poke { sender, text }) => {
                    assert_eq!(sender.as_str(), "Ana");
                    assert_eq!(text.as_str(), "hi");
                }
                other => panic!("{}: unexpected {:?}", fields, other),
            }
            assert!(a.iter().any(|x| matches!(x, Action::PublishPoke { .. })));
        }
    }

    #[test]
    fn test_claim_request_and_junk() {
        let (mut m, _) = connected();
        let a = m.handle_socket_text(r#"{"type":"claim_request"}"#);
        match emitted(&a) {
            Some(NetworkEvent::ClaimRequest { user_name }) => {
                assert_eq!(user_name.as_str(), "Unknown")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(m.handle_socket_text("not json").is_empty());
        assert!(m.handle_socket_text(r#"{"type":"welcome"}"#).is_empty());
    }

    #[test]
    fn test_broker_commands() {
        let (mut m, _) = connected();
        let topics = Topics::new("qbit", "ABC");

        let a = m.handle_broker_message(&topics, "qbit/ABC/mute/set", b"ON");
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::Command(RemoteCommand::Mute(true)))
        ));
        let a = m.handle_broker_message(&topics, "qbit/ABC/mute/set", b"OFF");
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::Command(RemoteCommand::Mute(false)))
        ));

        let a = m.handle_broker_message(&topics, "qbit/ABC/animation/next", b"");
        assert!(matches!(
            emitted(&a),
            Some(NetworkEvent::Command(RemoteCommand::NextAnimation))
        ));

        let a = m.handle_broker_message(&topics, "qbit/ABC/command", br#"{"command":"poke"}"#);
        match emitted(&a) {
            Some(NetworkEvent::Poke { sender, text }) => {
                assert_eq!(sender.as_str(), "MQTT");
                assert_eq!(text.as_str(), "Poke!");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(m
            .handle_broker_message(&topics, "qbit/OTHER/command", br#"{"command":"poke"}"#)
            .is_empty());
    }

    #[test]
    fn test_poke_text_set_truncates() {
        let (mut m, _) = connected();
        let topics = Topics::new("qbit", "ABC");
        let a = m.handle_broker_message(
            &topics,
            "qbit/ABC/poke_text/set",
            b"This message is longer than twenty-five characters",
        );
        match emitted(&a) {
            Some(NetworkEvent::Poke { sender, text }) => {
                assert_eq!(sender.as_str(), "Home Assistant");
                assert_eq!(text.as_str(), "This message is longer th");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
