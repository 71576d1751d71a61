//! Build script for qbit-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates device.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Tables the firmware reads; all must be present even if empty
const REQUIRED_SECTIONS: [&str; 8] = [
    "device", "wifi", "server", "mqtt", "display", "audio", "pins", "time",
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate device.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=device.toml");

    let config_path = Path::new("device.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: device.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds a device.toml configuration file.           ║\n\
            ║  Please create one in the qbit-firmware directory.               ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read device.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in device.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    validate_required_sections(&config);

    let mut errors = Vec::new();
    validate_strings(&config, &mut errors);
    validate_ranges(&config, &mut errors);
    validate_pins(&config, &mut errors);
    validate_mqtt(&config, &mut errors);
    report("Invalid values in device.toml", &errors);

    if string_at(&config, "wifi", "ssid").map_or(true, str::is_empty) {
        println!("cargo:warning=device.toml has no WiFi SSID; the device will start in setup mode");
    }

    println!("cargo:warning=device.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail the build with a boxed list of errors
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn validate_required_sections(config: &toml::Value) {
    let errors: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|s| !matches!(config.get(**s), Some(toml::Value::Table(_))))
        .map(|s| format!("Missing [{}] section", s))
        .collect();
    report("Missing required sections in device.toml", &errors);
}

fn string_at<'a>(config: &'a toml::Value, section: &str, key: &str) -> Option<&'a str> {
    config.get(section)?.get(key)?.as_str()
}

fn int_at(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

/// String fields and the most bytes the firmware stores for each
fn validate_strings(config: &toml::Value, errors: &mut Vec<String>) {
    const LIMITS: [(&str, &str, usize); 11] = [
        ("device", "name", 32),
        ("wifi", "ssid", 32),
        ("wifi", "password", 64),
        ("server", "host", 64),
        ("server", "path", 32),
        ("server", "api_key", 64),
        ("mqtt", "host", 64),
        ("mqtt", "username", 32),
        ("mqtt", "password", 64),
        ("mqtt", "topic_prefix", 32),
        ("time", "timezone", 32),
    ];

    for (section, key, max) in LIMITS {
        let Some(value) = config.get(section).and_then(|s| s.get(key)) else {
            continue;
        };
        match value.as_str() {
            Some(s) if s.len() > max => {
                errors.push(format!("[{}] {} longer than {} bytes", section, key, max))
            }
            Some(_) => {}
            None => errors.push(format!("[{}] {} must be a string", section, key)),
        }
    }

    if let Some(tz) = string_at(config, "time", "timezone") {
        if !tz.is_empty() && !tz.contains('/') {
            errors.push("[time] timezone must be an IANA name like \"Europe/Berlin\"".to_string());
        }
    }

    if let Some(path) = string_at(config, "server", "path") {
        if !path.starts_with('/') {
            errors.push("[server] path must start with '/'".to_string());
        }
    }
}

fn validate_ranges(config: &toml::Value, errors: &mut Vec<String>) {
    const RANGES: [(&str, &str, i64, i64); 6] = [
        ("display", "brightness", 0, 255),
        ("display", "speed", 1, 100),
        ("audio", "volume", 0, 100),
        ("server", "port", 1, 65535),
        ("mqtt", "port", 1, 65535),
        ("time", "utc_offset_minutes", -840, 840),
    ];

    for (section, key, min, max) in RANGES {
        let Some(value) = config.get(section).and_then(|s| s.get(key)) else {
            continue;
        };
        match value.as_integer() {
            Some(v) if v < min || v > max => errors.push(format!(
                "[{}] {} must be {}..={}",
                section, key, min, max
            )),
            Some(_) => {}
            None => errors.push(format!("[{}] {} must be an integer", section, key)),
        }
    }
}

/// Pins are `N` or `"gpioN"`, 0..=29, and must not collide
fn validate_pins(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(toml::Value::Table(pins)) = config.get("pins") else {
        return;
    };

    let mut used: Vec<(i64, &str)> = Vec::new();
    for (name, value) in pins {
        let pin = match value {
            toml::Value::Integer(n) => Some(*n),
            toml::Value::String(s) => s.strip_prefix("gpio").and_then(|d| d.parse().ok()),
            _ => None,
        };
        match pin {
            Some(n) if (0..=29).contains(&n) => {
                if let Some((_, other)) = used.iter().find(|(p, _)| *p == n) {
                    errors.push(format!("[pins] {} and {} both use GPIO{}", name, other, n));
                }
                used.push((n, name));
            }
            _ => errors.push(format!("[pins] {} must be 0..=29 or \"gpioN\"", name)),
        }
    }
}

fn validate_mqtt(config: &toml::Value, errors: &mut Vec<String>) {
    let enabled = config
        .get("mqtt")
        .and_then(|m| m.get("enabled"))
        .and_then(|e| e.as_bool())
        .unwrap_or(false);
    if enabled && string_at(config, "mqtt", "host").map_or(true, str::is_empty) {
        errors.push("[mqtt] enabled but host is empty".to_string());
    }
    if let Some(prefix) = string_at(config, "mqtt", "topic_prefix") {
        if prefix.is_empty() || prefix.contains(['#', '+', '/']) {
            errors.push("[mqtt] topic_prefix must be a non-empty plain word".to_string());
        }
    }
    if int_at(config, "server", "port").is_some() && string_at(config, "server", "host").is_none() {
        errors.push("[server] port given without host".to_string());
    }
}
