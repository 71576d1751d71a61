//! Settings types and defaults

use core::fmt::Write;

use heapless::String;

use crate::timezone::{TimeZone, ZoneId, MAX_ZONE_NAME};

/// Maximum length of short labels (device name, topic prefix, user names)
pub const MAX_LABEL_LEN: usize = 32;

/// Maximum length of host names
pub const MAX_HOST_LEN: usize = 64;

/// Maximum length of secrets (WiFi passphrase, broker password, API key)
pub const MAX_SECRET_LEN: usize = 64;

/// Device id length: 12 hex digits of the WiFi MAC
pub const DEVICE_ID_LEN: usize = 12;

pub const DEFAULT_BRIGHTNESS: u8 = 0x80;
pub const DEFAULT_VOLUME: u8 = 100;
pub const DEFAULT_SPEED: u16 = 5;
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_PREFIX: &str = "qbit";
pub const DEFAULT_SERVER_PORT: u16 = 80;
pub const DEFAULT_SERVER_PATH: &str = "/device";

/// SSID of the setup access point
pub const AP_SSID: &str = "QBIT";

/// GPIO assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinAssignment {
    pub touch: u8,
    pub buzzer: u8,
    pub sda: u8,
    pub scl: u8,
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            touch: 1,
            buzzer: 2,
            sda: 20,
            scl: 21,
        }
    }
}

/// MQTT broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrokerConfig {
    pub enabled: bool,
    pub host: String<MAX_HOST_LEN>,
    pub port: u16,
    pub username: String<MAX_LABEL_LEN>,
    pub password: String<MAX_SECRET_LEN>,
    pub topic_prefix: String<MAX_LABEL_LEN>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let mut topic_prefix = String::new();
        let _ = topic_prefix.push_str(DEFAULT_TOPIC_PREFIX);
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_BROKER_PORT,
            username: String::new(),
            password: String::new(),
            topic_prefix,
        }
    }
}

impl BrokerConfig {
    /// Enabled and pointing somewhere
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.host.is_empty()
    }
}

/// Cloud peer reached over the device socket
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServerConfig {
    pub host: String<MAX_HOST_LEN>,
    pub port: u16,
    pub path: String<MAX_LABEL_LEN>,
    /// Sent as `Authorization: Bearer <key>` when non-empty
    pub api_key: String<MAX_SECRET_LEN>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut path = String::new();
        let _ = path.push_str(DEFAULT_SERVER_PATH);
        Self {
            host: String::new(),
            port: DEFAULT_SERVER_PORT,
            path,
            api_key: String::new(),
        }
    }
}

/// Station credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WifiCredentials {
    pub ssid: String<MAX_LABEL_LEN>,
    pub password: String<MAX_SECRET_LEN>,
}

/// Identity derived from the WiFi MAC address
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    /// 12 upper-case hex digits
    pub id: String<DEVICE_ID_LEN>,
    /// Setup AP passphrase: the low 32 bits of the MAC in hex
    pub ap_password: String<8>,
}

impl DeviceIdentity {
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut id = String::new();
        for b in mac {
            let _ = write!(id, "{:02X}", b);
        }
        let mut ap_password = String::new();
        for b in &mac[2..] {
            let _ = write!(ap_password, "{:02X}", b);
        }
        Self { id, ap_password }
    }

    /// `QBIT-` followed by the first four digits of the id
    pub fn default_name(&self) -> String<MAX_LABEL_LEN> {
        let mut name = String::new();
        let _ = name.push_str("QBIT-");
        let _ = name.push_str(self.id.get(..4).unwrap_or(self.id.as_str()));
        name
    }
}

/// Read access to the device settings
pub trait Settings {
    /// Panel contrast
    fn brightness(&self) -> u8;
    /// Buzzer volume 0..=100, 0 = muted
    fn volume(&self) -> u8;
    /// Animation speed divisor, at least 1
    fn playback_speed(&self) -> u16;
    fn device_id(&self) -> &str;
    fn device_name(&self) -> &str;
    fn ap_password(&self) -> &str;
    fn wifi(&self) -> &WifiCredentials;
    fn server(&self) -> &ServerConfig;
    fn broker(&self) -> &BrokerConfig;
    fn pins(&self) -> PinAssignment;
    /// Fixed local time offset from UTC, used when no zone is named
    fn utc_offset_minutes(&self) -> i32;
    /// IANA zone name, `None` to detect it from the public address
    fn timezone(&self) -> Option<&str>;

    /// Rule for local time: the named zone, else the fixed offset
    fn time_zone(&self) -> TimeZone {
        self.timezone()
            .and_then(ZoneId::from_iana)
            .map(ZoneId::rule)
            .unwrap_or(TimeZone::fixed(self.utc_offset_minutes()))
    }
}

/// Owned settings with the device defaults
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
    pub identity: DeviceIdentity,
    pub name: String<MAX_LABEL_LEN>,
    pub brightness: u8,
    pub volume: u8,
    pub speed: u16,
    pub wifi: WifiCredentials,
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub pins: PinAssignment,
    pub utc_offset_minutes: i32,
    /// Empty when unset
    pub timezone: String<MAX_ZONE_NAME>,
}

impl DeviceSettings {
    /// Defaults for a device with this MAC
    pub fn with_identity(identity: DeviceIdentity) -> Self {
        let name = identity.default_name();
        Self {
            identity,
            name,
            brightness: DEFAULT_BRIGHTNESS,
            volume: DEFAULT_VOLUME,
            speed: DEFAULT_SPEED,
            wifi: WifiCredentials::default(),
            server: ServerConfig::default(),
            broker: BrokerConfig::default(),
            pins: PinAssignment::default(),
            utc_offset_minutes: 0,
            timezone: String::new(),
        }
    }
}

impl Settings for DeviceSettings {
    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn volume(&self) -> u8 {
        self.volume.min(100)
    }

    fn playback_speed(&self) -> u16 {
        self.speed.max(1)
    }

    fn device_id(&self) -> &str {
        &self.identity.id
    }

    fn device_name(&self) -> &str {
        &self.name
    }

    fn ap_password(&self) -> &str {
        &self.identity.ap_password
    }

    fn wifi(&self) -> &WifiCredentials {
        &self.wifi
    }

    fn server(&self) -> &ServerConfig {
        &self.server
    }

    fn broker(&self) -> &BrokerConfig {
        &self.broker
    }

    fn pins(&self) -> PinAssignment {
        self.pins
    }

    fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    fn timezone(&self) -> Option<&str> {
        Some(self.timezone.as_str()).filter(|tz| !tz.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0x28, 0xCD, 0xC1, 0x0A, 0xB3, 0x4F];

    #[test]
    fn test_identity_from_mac() {
        let id = DeviceIdentity::from_mac(MAC);
        assert_eq!(id.id.as_str(), "28CDC10AB34F");
        assert_eq!(id.ap_password.as_str(), "C10AB34F");
        assert_eq!(id.default_name().as_str(), "QBIT-28CD");
    }

    #[test]
    fn test_defaults() {
        let s = DeviceSettings::with_identity(DeviceIdentity::from_mac(MAC));
        assert_eq!(s.brightness(), 0x80);
        assert_eq!(s.volume(), 100);
        assert_eq!(s.playback_speed(), 5);
        assert_eq!(s.device_name(), "QBIT-28CD");
        assert_eq!(s.pins(), PinAssignment { touch: 1, buzzer: 2, sda: 20, scl: 21 });
        assert_eq!(s.broker().port, 1883);
        assert_eq!(s.broker().topic_prefix.as_str(), "qbit");
        assert!(!s.broker().is_usable());
        assert_eq!(s.server().path.as_str(), "/device");
        assert_eq!(s.utc_offset_minutes(), 0);
        assert_eq!(s.timezone(), None);
        assert_eq!(s.time_zone(), TimeZone::UTC);
    }

    #[test]
    fn test_named_zone_wins_over_offset() {
        let mut s = DeviceSettings::with_identity(DeviceIdentity::from_mac(MAC));
        s.utc_offset_minutes = -300;
        assert_eq!(s.time_zone(), TimeZone::fixed(-300));

        s.timezone = String::try_from("Europe/Helsinki").unwrap();
        let tz = s.time_zone();
        assert!(tz.has_dst());
        // January: EET, +2h
        assert_eq!(tz.offset_secs(1_704_067_200), 7200);
    }

    #[test]
    fn test_clamping() {
        let mut s = DeviceSettings::with_identity(DeviceIdentity::from_mac(MAC));
        s.speed = 0;
        s.volume = 250;
        assert_eq!(s.playback_speed(), 1);
        assert_eq!(s.volume(), 100);
    }
}
