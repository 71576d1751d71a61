//! Connectivity flags register

use portable_atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::timezone::ZoneId;

/// One bit of the register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    /// WiFi station associated with an address
    Wifi,
    /// Device socket to the peer open
    Socket,
    /// MQTT broker session established
    Broker,
    /// Setup access point running
    Portal,
}

impl Flag {
    const fn bit(self) -> u8 {
        match self {
            Flag::Wifi => 1 << 0,
            Flag::Socket => 1 << 1,
            Flag::Broker => 1 << 2,
            Flag::Portal => 1 << 3,
        }
    }
}

/// Plain copy of the register, taken once per render tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectivitySnapshot {
    pub wifi_up: bool,
    pub socket_up: bool,
    pub broker_up: bool,
    pub portal_active: bool,
    /// Uptime when the link was declared lost; `None` while connected or
    /// before the first loss is detected
    pub link_lost_ms: Option<u64>,
    pub ip: Option<[u8; 4]>,
    /// `unix_ms - uptime_ms` from the last SNTP sync
    pub time_base_ms: Option<u64>,
    /// Zone detected from the public address
    pub zone: Option<ZoneId>,
}

/// Single-writer register shared by reference between tasks
///
/// Zero encodes "unset" for the timestamp, address, time base and zone
/// fields. The zone is stored as its table index plus one.
pub struct ConnectivityFlags {
    bits: AtomicU8,
    link_lost_ms: AtomicU64,
    ip: AtomicU32,
    time_base_ms: AtomicU64,
    zone: AtomicU8,
}

impl Default for ConnectivityFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityFlags {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
            link_lost_ms: AtomicU64::new(0),
            ip: AtomicU32::new(0),
            time_base_ms: AtomicU64::new(0),
            zone: AtomicU8::new(0),
        }
    }

    pub fn set(&self, flag: Flag) {
        self.bits.fetch_or(flag.bit(), Ordering::Release);
    }

    pub fn clear(&self, flag: Flag) {
        self.bits.fetch_and(!flag.bit(), Ordering::Release);
    }

    pub fn is_set(&self, flag: Flag) -> bool {
        self.bits.load(Ordering::Acquire) & flag.bit() != 0
    }

    /// Record when the link was lost; a stored 0 would read as "unset"
    pub fn set_link_lost(&self, at_ms: Option<u64>) {
        let raw = at_ms.map(|t| t.max(1)).unwrap_or(0);
        self.link_lost_ms.store(raw, Ordering::Release);
    }

    pub fn set_ip(&self, ip: Option<[u8; 4]>) {
        self.ip
            .store(ip.map(u32::from_be_bytes).unwrap_or(0), Ordering::Release);
    }

    pub fn set_time_base(&self, base_ms: Option<u64>) {
        self.time_base_ms
            .store(base_ms.unwrap_or(0), Ordering::Release);
    }

    pub fn set_zone(&self, zone: Option<ZoneId>) {
        self.zone
            .store(zone.map(|z| z.index() + 1).unwrap_or(0), Ordering::Release);
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        let bits = self.bits.load(Ordering::Acquire);
        let lost = self.link_lost_ms.load(Ordering::Acquire);
        let ip = self.ip.load(Ordering::Acquire);
        let base = self.time_base_ms.load(Ordering::Acquire);
        let zone = self.zone.load(Ordering::Acquire);
        ConnectivitySnapshot {
            wifi_up: bits & Flag::Wifi.bit() != 0,
            socket_up: bits & Flag::Socket.bit() != 0,
            broker_up: bits & Flag::Broker.bit() != 0,
            portal_active: bits & Flag::Portal.bit() != 0,
            link_lost_ms: (lost != 0).then_some(lost),
            ip: (ip != 0).then(|| ip.to_be_bytes()),
            time_base_ms: (base != 0).then_some(base),
            zone: zone.checked_sub(1).and_then(ZoneId::from_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_independent() {
        let f = ConnectivityFlags::new();
        f.set(Flag::Wifi);
        f.set(Flag::Broker);
        f.clear(Flag::Wifi);
        assert!(!f.is_set(Flag::Wifi));
        assert!(f.is_set(Flag::Broker));

        let s = f.snapshot();
        assert!(!s.wifi_up && s.broker_up && !s.socket_up && !s.portal_active);
    }

    #[test]
    fn test_link_lost_never_zero() {
        let f = ConnectivityFlags::new();
        assert_eq!(f.snapshot().link_lost_ms, None);
        f.set_link_lost(Some(0));
        assert_eq!(f.snapshot().link_lost_ms, Some(1));
        f.set_link_lost(None);
        assert_eq!(f.snapshot().link_lost_ms, None);
    }

    #[test]
    fn test_ip_and_time_base() {
        let f = ConnectivityFlags::new();
        f.set_ip(Some([192, 168, 1, 42]));
        f.set_time_base(Some(1_700_000_000_000));
        let s = f.snapshot();
        assert_eq!(s.ip, Some([192, 168, 1, 42]));
        assert_eq!(s.time_base_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_zone_round_trips_including_first_entry() {
        let f = ConnectivityFlags::new();
        assert_eq!(f.snapshot().zone, None);
        for name in ["Pacific/Midway", "Europe/Berlin", "Etc/UTC"] {
            let zone = ZoneId::from_iana(name);
            f.set_zone(zone);
            assert_eq!(f.snapshot().zone, zone);
        }
        f.set_zone(None);
        assert_eq!(f.snapshot().zone, None);
    }
}
