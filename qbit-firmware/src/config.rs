//! Device configuration loading
//!
//! Parses the `device.toml` embedded at build time. The file was validated
//! by build.rs, so a parse failure here means the validator and the
//! runtime reader disagree; the device then runs on defaults.

use defmt::*;

use qbit_core::config::{
    parse_settings, DeviceIdentity, DeviceSettings, ParseError, PinAssignment, Settings,
};

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum ConfigError {
    /// device.toml could not be read
    Parse(ParseError),
    /// `[pins]` differs from the board wiring
    PinsNotWired(PinAssignment),
}

impl From<ParseError> for ConfigError {
    fn from(e: ParseError) -> Self {
        ConfigError::Parse(e)
    }
}

/// Pins the QBIT board routes to the touch pad, buzzer and panel
pub const BOARD_PINS: PinAssignment = PinAssignment {
    touch: 1,
    buzzer: 2,
    sda: 20,
    scl: 21,
};

/// Parse `source` for the device with this MAC
///
/// Falls back to the defaults on a parse error. A `[pins]` table that
/// disagrees with the board is logged and otherwise ignored.
pub fn load_settings(source: &str, mac: [u8; 6]) -> DeviceSettings {
    let identity = DeviceIdentity::from_mac(mac);
    let settings = match parse_settings(source, identity.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("device.toml invalid: {:?}, using defaults", ConfigError::from(e));
            DeviceSettings::with_identity(identity)
        }
    };

    if settings.pins() != BOARD_PINS {
        warn!(
            "Ignoring {:?}: board is wired as {}",
            ConfigError::PinsNotWired(settings.pins()),
            BOARD_PINS
        );
    }

    log_settings_summary(&settings);
    settings
}

fn log_settings_summary(s: &DeviceSettings) {
    info!("Device {} ({})", s.device_name(), s.device_id());
    info!(
        "  brightness={} volume={} speed={} utc_offset={}min",
        s.brightness(),
        s.volume(),
        s.playback_speed(),
        s.utc_offset_minutes()
    );
    match s.timezone() {
        Some(tz) => info!("  Timezone: {}", tz),
        None => info!("  Timezone: detect on first connect"),
    }
    if s.wifi().ssid.is_empty() {
        info!("  WiFi: not configured, setup AP will start");
    } else {
        info!("  WiFi: {}", s.wifi().ssid.as_str());
    }
    if s.server().host.is_empty() {
        info!("  Socket: disabled");
    } else {
        info!(
            "  Socket: {}:{}{}",
            s.server().host.as_str(),
            s.server().port,
            s.server().path.as_str()
        );
    }
    if s.broker().is_usable() {
        info!(
            "  MQTT: {}:{} prefix={}",
            s.broker().host.as_str(),
            s.broker().port,
            s.broker().topic_prefix.as_str()
        );
    } else {
        info!("  MQTT: disabled");
    }
}
