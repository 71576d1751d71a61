//! WiFi station and setup access point
//!
//! The CYW43 runs either as a station or as the setup AP, never both.
//! While the AP is up the station join is retried now and then by taking
//! the AP down for the attempt.

use cyw43::{Control, JoinOptions};
use defmt::*;
use embassy_net::{ConfigV4, DhcpConfig, Ipv4Address, Ipv4Cidr, Stack, StaticConfigV4};
use embassy_time::{with_timeout, Duration};

use qbit_core::config::{WifiCredentials, AP_SSID};

/// Address of the device on its own access point
pub const AP_ADDRESS: Ipv4Address = Ipv4Address::new(192, 168, 4, 1);

/// Channel the setup AP runs on
const AP_CHANNEL: u8 = 6;

/// Interval between station joins while the link is down
pub const JOIN_RETRY_MS: u64 = 5000;

/// Interval between station joins while the setup AP is up
pub const PORTAL_JOIN_RETRY_MS: u64 = 30_000;

/// How long to wait for a DHCP lease after joining
const DHCP_TIMEOUT_SECS: u64 = 10;

/// What the radio is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RadioMode {
    Station,
    AccessPoint,
}

/// CYW43 control plus the stack's addressing
pub struct Wifi {
    control: Control<'static>,
    stack: Stack<'static>,
    credentials: WifiCredentials,
    ap_password: heapless::String<8>,
    mode: RadioMode,
    /// Uptime of the last join attempt
    last_join_ms: Option<u64>,
}

impl Wifi {
    pub fn new(
        control: Control<'static>,
        stack: Stack<'static>,
        credentials: WifiCredentials,
        ap_password: &str,
    ) -> Self {
        let mut password = heapless::String::new();
        let _ = password.push_str(ap_password);
        Self {
            control,
            stack,
            credentials,
            ap_password: password,
            mode: RadioMode::Station,
            last_join_ms: None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.credentials.ssid.is_empty()
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Station address, if associated with a lease
    pub fn station_ip(&self) -> Option<[u8; 4]> {
        if self.mode != RadioMode::Station || !self.stack.is_link_up() {
            return None;
        }
        self.stack
            .config_v4()
            .map(|c| c.address.address().octets())
    }

    /// Join the configured network if the retry interval has passed
    ///
    /// Returns true when the station came up.
    pub async fn maybe_join(&mut self, now_ms: u64) -> bool {
        if !self.has_credentials() || self.station_ip().is_some() {
            return false;
        }
        let interval = match self.mode {
            RadioMode::Station => JOIN_RETRY_MS,
            RadioMode::AccessPoint => PORTAL_JOIN_RETRY_MS,
        };
        if self
            .last_join_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < interval)
        {
            return false;
        }
        self.last_join_ms = Some(now_ms);

        let from_ap = self.mode == RadioMode::AccessPoint;
        if from_ap {
            self.close_ap().await;
        }

        if self.join().await {
            return true;
        }

        if from_ap {
            self.start_ap().await;
        }
        false
    }

    async fn join(&mut self) -> bool {
        info!("Joining WiFi '{}'", self.credentials.ssid.as_str());
        self.stack
            .set_config_v4(ConfigV4::Dhcp(DhcpConfig::default()));

        let options = JoinOptions::new(self.credentials.password.as_bytes());
        if let Err(e) = self
            .control
            .join(self.credentials.ssid.as_str(), options)
            .await
        {
            warn!("WiFi join failed: status {}", e.status);
            return false;
        }

        match with_timeout(
            Duration::from_secs(DHCP_TIMEOUT_SECS),
            self.stack.wait_config_up(),
        )
        .await
        {
            Ok(()) => {
                info!("WiFi connected");
                true
            }
            Err(_) => {
                warn!("No DHCP lease, leaving network");
                self.control.leave().await;
                false
            }
        }
    }

    /// Bring up the setup access point
    pub async fn start_ap(&mut self) {
        if self.mode == RadioMode::AccessPoint {
            return;
        }
        self.control.leave().await;
        self.stack.set_config_v4(ConfigV4::Static(StaticConfigV4 {
            address: Ipv4Cidr::new(AP_ADDRESS, 24),
            gateway: Some(AP_ADDRESS),
            dns_servers: Default::default(),
        }));
        self.control
            .start_ap_wpa2(AP_SSID, self.ap_password.as_str(), AP_CHANNEL)
            .await;
        self.mode = RadioMode::AccessPoint;
        info!("Setup AP '{}' started", AP_SSID);
    }

    /// Take the access point down and go back to station addressing
    pub async fn close_ap(&mut self) {
        if self.mode != RadioMode::AccessPoint {
            return;
        }
        self.control.close_ap().await;
        self.stack
            .set_config_v4(ConfigV4::Dhcp(DhcpConfig::default()));
        self.mode = RadioMode::Station;
        info!("Setup AP stopped");
    }
}
