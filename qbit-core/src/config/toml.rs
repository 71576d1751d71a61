//! Minimal reader for `device.toml`
//!
//! Handles only the subset the device file uses. It does NOT support
//! arbitrary TOML.
//!
//! Supported features:
//! - `[section]` headers
//! - Key = value pairs (string, integer, boolean)
//! - Comments (# ...), including trailing comments after a value
//!
//! Unknown keys are ignored so older firmware accepts newer files; an
//! unknown section is an error. Keys that are absent keep their defaults.

use heapless::String;

use super::settings::{DeviceIdentity, DeviceSettings};
use crate::timezone::ZoneId;

/// Highest GPIO number on the RP2040
pub const MAX_GPIO: u8 = 29;

/// Largest accepted UTC offset (UTC+14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// String does not fit its field
    TooLong,
    /// Pin is not `N` or `gpioN` with N in 0..=29
    InvalidPin,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Device,
    Wifi,
    Server,
    Mqtt,
    Display,
    Audio,
    Pins,
    Time,
}

/// Parse `device.toml` on top of the defaults for `identity`
pub fn parse_settings(input: &str, identity: DeviceIdentity) -> Result<DeviceSettings, ParseError> {
    let mut settings = DeviceSettings::with_identity(identity);
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = line
                .strip_prefix('[')
                .and_then(|l| l.split('#').next())
                .map(str::trim)
                .and_then(|l| l.strip_suffix(']'))
                .ok_or(ParseError::InvalidSection)?;
            section = parse_section_header(header)?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut settings)?;
        }
    }

    // An empty name means "derive from the id"
    if settings.name.is_empty() {
        settings.name = settings.identity.default_name();
    }

    Ok(settings)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "device" => Ok(Section::Device),
        "wifi" => Ok(Section::Wifi),
        "server" => Ok(Section::Server),
        "mqtt" => Ok(Section::Mqtt),
        "display" => Ok(Section::Display),
        "audio" => Ok(Section::Audio),
        "pins" => Ok(Section::Pins),
        "time" => Ok(Section::Time),
        _ => Err(ParseError::InvalidSection),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    s: &mut DeviceSettings,
) -> Result<(), ParseError> {
    match (section, key) {
        (Section::Device, "name") => s.name = parse_bounded(value)?,

        (Section::Wifi, "ssid") => s.wifi.ssid = parse_bounded(value)?,
        (Section::Wifi, "password") => s.wifi.password = parse_bounded(value)?,

        (Section::Server, "host") => s.server.host = parse_bounded(value)?,
        (Section::Server, "port") => s.server.port = parse_port(value)?,
        (Section::Server, "path") => s.server.path = parse_bounded(value)?,
        (Section::Server, "api_key") => s.server.api_key = parse_bounded(value)?,

        (Section::Mqtt, "enabled") => s.broker.enabled = parse_bool(value)?,
        (Section::Mqtt, "host") => s.broker.host = parse_bounded(value)?,
        (Section::Mqtt, "port") => s.broker.port = parse_port(value)?,
        (Section::Mqtt, "username") => s.broker.username = parse_bounded(value)?,
        (Section::Mqtt, "password") => s.broker.password = parse_bounded(value)?,
        (Section::Mqtt, "topic_prefix") => s.broker.topic_prefix = parse_bounded(value)?,

        (Section::Display, "brightness") => s.brightness = parse_int(value)?,
        (Section::Display, "speed") => {
            s.speed = parse_int(value)?;
            if s.speed == 0 {
                return Err(ParseError::InvalidValue);
            }
        }

        (Section::Audio, "volume") => {
            s.volume = parse_int(value)?;
            if s.volume > 100 {
                return Err(ParseError::InvalidValue);
            }
        }

        (Section::Pins, "touch") => s.pins.touch = parse_pin(value)?,
        (Section::Pins, "buzzer") => s.pins.buzzer = parse_pin(value)?,
        (Section::Pins, "sda") => s.pins.sda = parse_pin(value)?,
        (Section::Pins, "scl") => s.pins.scl = parse_pin(value)?,

        (Section::Time, "utc_offset_minutes") => {
            let offset: i32 = parse_int(value)?;
            if offset.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(ParseError::InvalidValue);
            }
            s.utc_offset_minutes = offset;
        }
        (Section::Time, "timezone") => {
            s.timezone = parse_bounded(value)?;
            // Empty means "detect"; anything else must be a known zone
            if !s.timezone.is_empty() && ZoneId::from_iana(&s.timezone).is_none() {
                return Err(ParseError::InvalidValue);
            }
        }

        // Unknown keys are ignored
        _ => {}
    }
    Ok(())
}

/// Split `key = value`, dropping a trailing comment outside quotes
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    let value = match comment_start(value) {
        Some(hash_pos) => value[..hash_pos].trim(),
        None => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Byte offset of the first `#` outside a quoted string
fn comment_start(value: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

fn parse_bounded<const N: usize>(value: &str) -> Result<String<N>, ParseError> {
    String::try_from(parse_string(value)).map_err(|_| ParseError::TooLong)
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_port(value: &str) -> Result<u16, ParseError> {
    match parse_int::<u16>(value)? {
        0 => Err(ParseError::InvalidValue),
        port => Ok(port),
    }
}

/// Parse a pin given as `21`, `gpio21` or `"gpio21"`
fn parse_pin(value: &str) -> Result<u8, ParseError> {
    let value = parse_string(value);
    let digits = value.strip_prefix("gpio").unwrap_or(value);
    let pin: u8 = digits.parse().map_err(|_| ParseError::InvalidPin)?;
    if pin > MAX_GPIO {
        return Err(ParseError::InvalidPin);
    }
    Ok(pin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PinAssignment, Settings};

    const MAC: [u8; 6] = [0x28, 0xCD, 0xC1, 0x0A, 0xB3, 0x4F];

    fn parse(input: &str) -> Result<DeviceSettings, ParseError> {
        parse_settings(input, DeviceIdentity::from_mac(MAC))
    }

    #[test]
    fn test_full_file() {
        let s = parse(
            r#"
# Living room unit
[device]
name = "Desk"

[wifi]
ssid = "home"
password = "hunter22#x"   # hash inside quotes is kept

[server]
host = "qbit.example.com"
port = 8080
api_key = "k3y"

[mqtt]
enabled = true
host = "10.0.0.2"
username = "ha"
password = "secret"
topic_prefix = "office"

[display]
brightness = 200
speed = 3

[audio]
volume = 40

[pins]
touch = "gpio3"
buzzer = 15

[time]
utc_offset_minutes = -300
timezone = "America/Chicago"
"#,
        )
        .unwrap();

        assert_eq!(s.device_name(), "Desk");
        assert_eq!(s.wifi().ssid.as_str(), "home");
        assert_eq!(s.wifi().password.as_str(), "hunter22#x");
        assert_eq!(s.server().port, 8080);
        assert_eq!(s.server().path.as_str(), "/device");
        assert_eq!(s.server().api_key.as_str(), "k3y");
        assert!(s.broker().is_usable());
        assert_eq!(s.broker().port, 1883);
        assert_eq!(s.broker().topic_prefix.as_str(), "office");
        assert_eq!(s.brightness(), 200);
        assert_eq!(s.playback_speed(), 3);
        assert_eq!(s.volume(), 40);
        assert_eq!(
            s.pins(),
            PinAssignment { touch: 3, buzzer: 15, sda: 20, scl: 21 }
        );
        assert_eq!(s.utc_offset_minutes(), -300);
        assert_eq!(s.timezone(), Some("America/Chicago"));
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let s = parse("").unwrap();
        assert_eq!(s, DeviceSettings::with_identity(DeviceIdentity::from_mac(MAC)));
    }

    #[test]
    fn test_empty_name_uses_id() {
        let s = parse("[device]\nname = \"\"\n").unwrap();
        assert_eq!(s.device_name(), "QBIT-28CD");
    }

    #[test]
    fn test_unknown_key_ignored_unknown_section_rejected() {
        assert!(parse("[display]\nflip = true\n").is_ok());
        assert_eq!(parse("[motors]\n").unwrap_err(), ParseError::InvalidSection);
    }

    #[test]
    fn test_out_of_range_values() {
        assert_eq!(parse("[audio]\nvolume = 101\n").unwrap_err(), ParseError::InvalidValue);
        assert_eq!(parse("[display]\nspeed = 0\n").unwrap_err(), ParseError::InvalidValue);
        assert_eq!(parse("[server]\nport = 0\n").unwrap_err(), ParseError::InvalidValue);
        assert_eq!(
            parse("[time]\nutc_offset_minutes = 900\n").unwrap_err(),
            ParseError::InvalidValue
        );
        assert_eq!(parse("[pins]\nsda = 30\n").unwrap_err(), ParseError::InvalidPin);
        assert_eq!(
            parse("[time]\ntimezone = \"Mars/Base\"\n").unwrap_err(),
            ParseError::InvalidValue
        );
        assert!(parse("[time]\ntimezone = \"\"\n").is_ok());
        assert_eq!(parse("[mqtt]\nenabled = yes\n").unwrap_err(), ParseError::InvalidValue);
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(40);
        let input = alloc::format!("[device]\nname = \"{}\"\n", long);
        assert_eq!(parse(&input).unwrap_err(), ParseError::TooLong);
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(parse_pin("gpio21"), Ok(21));
        assert_eq!(parse_pin("\"gpio0\""), Ok(0));
        assert_eq!(parse_pin("7"), Ok(7));
        assert_eq!(parse_pin("gp7"), Err(ParseError::InvalidPin));
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("a = 1 # one"), Some(("a", "1")));
        assert_eq!(parse_key_value("a = \"#1\""), Some(("a", "\"#1\"")));
        assert_eq!(
            parse_key_value("p = \"pw#1\"   # note"),
            Some(("p", "\"pw#1\""))
        );
        assert_eq!(parse_key_value("a = \"#\" # \"x\" # y"), Some(("a", "\"#\"")));
        assert_eq!(parse_key_value("a ="), None);
        assert_eq!(parse_key_value("no value"), None);
    }
}
