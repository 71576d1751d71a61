//! Wall-clock time from an SNTP time base
//!
//! The network task learns `unix_ms - uptime_ms` from SNTP and shares it;
//! local time is that base plus uptime, shifted by the zone's offset.

use core::fmt::Write;

use heapless::String;

use crate::timezone::TimeZone;

/// Days since 1970-01-01 of a proleptic Gregorian date
pub fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

pub fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Broken-down civil time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Convert seconds since the Unix epoch (proleptic Gregorian)
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);

        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Self {
            year: year as i32,
            month: month as u8,
            day: day as u8,
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    /// Local time for `unix_secs` in `zone`
    pub fn local(unix_secs: u64, zone: &TimeZone) -> Self {
        let secs = unix_secs as i64;
        Self::from_unix(secs + i64::from(zone.offset_secs(secs)))
    }
}

/// `[ MM/DD HH:MM:SS ]` header of a history entry
pub fn history_header(timestamp: Option<u64>, zone: &TimeZone) -> String<24> {
    let mut out = String::new();
    match timestamp {
        Some(ts) => {
            let t = DateTime::local(ts, zone);
            let _ = write!(
                out,
                "[ {:02}/{:02} {:02}:{:02}:{:02} ]",
                t.month, t.day, t.hour, t.minute, t.second
            );
        }
        None => {
            let _ = out.push_str("[ --/-- --:--:-- ]");
        }
    }
    out
}

/// Local wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clock {
    /// `unix_ms - uptime_ms`, unknown until the first sync
    base_ms: Option<u64>,
    zone: TimeZone,
}

impl Clock {
    pub const fn new(zone: TimeZone) -> Self {
        Self {
            base_ms: None,
            zone,
        }
    }

    pub fn set_zone(&mut self, zone: TimeZone) {
        self.zone = zone;
    }

    pub fn set_base(&mut self, base_ms: Option<u64>) {
        self.base_ms = base_ms;
    }

    /// Record an SNTP result taken at `uptime_ms`
    pub fn sync(&mut self, unix_ms: u64, uptime_ms: u64) {
        self.base_ms = Some(unix_ms.saturating_sub(uptime_ms));
    }

    pub fn base_ms(&self) -> Option<u64> {
        self.base_ms
    }

    pub fn zone(&self) -> &TimeZone {
        &self.zone
    }

    pub fn is_synced(&self) -> bool {
        self.base_ms.is_some()
    }

    pub fn unix_secs(&self, uptime_ms: u64) -> Option<u64> {
        self.base_ms.map(|b| (b + uptime_ms) / 1000)
    }

    pub fn local(&self, uptime_ms: u64) -> Option<DateTime> {
        self.unix_secs(uptime_ms)
            .map(|s| DateTime::local(s, &self.zone))
    }

    /// `HH:MM`, or `--:--` before the first sync
    pub fn hhmm(&self, uptime_ms: u64) -> String<8> {
        let mut out = String::new();
        match self.local(uptime_ms) {
            Some(t) => {
                let _ = write!(out, "{:02}:{:02}", t.hour, t.minute);
            }
            None => {
                let _ = out.push_str("--:--");
            }
        }
        out
    }

    /// `YYYY-MM-DD`, or dashes before the first sync
    pub fn date(&self, uptime_ms: u64) -> String<12> {
        let mut out = String::new();
        match self.local(uptime_ms) {
            Some(t) => {
                let _ = write!(out, "{:04}-{:02}-{:02}", t.year, t.month, t.day);
            }
            None => {
                let _ = out.push_str("----------");
            }
        }
        out
    }

    /// `YYYY-MM-DDTHH:MM:SS` local time, `None` before the first sync
    pub fn iso8601(&self, uptime_ms: u64) -> Option<String<20>> {
        let t = self.local(uptime_ms)?;
        let mut out = String::new();
        let _ = write!(
            out,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            t.year, t.month, t.day, t.hour, t.minute, t.second
        );
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_and_known_dates() {
        assert_eq!(
            DateTime::from_unix(0),
            DateTime { year: 1970, month: 1, day: 1, hour: 0, minute: 0, second: 0 }
        );
        assert_eq!(
            DateTime::from_unix(1_700_000_000),
            DateTime { year: 2023, month: 11, day: 14, hour: 22, minute: 13, second: 20 }
        );
        let leap = DateTime::from_unix(951_782_400);
        assert_eq!((leap.year, leap.month, leap.day), (2000, 2, 29));
    }

    #[test]
    fn test_offset_crosses_midnight() {
        let t = DateTime::local(1_700_000_000, &TimeZone::fixed(120));
        assert_eq!((t.day, t.hour, t.minute), (15, 0, 13));
        let t = DateTime::local(1_700_000_000, &TimeZone::fixed(-23 * 60));
        assert_eq!((t.day, t.hour), (13, 23));
    }

    #[test]
    fn test_days_from_civil() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(days_from_civil(2024, 3, 31) * 86_400, 1_711_843_200);
        for days in [-1000i64, 0, 11_016, 19_813, 40_000] {
            let t = DateTime::from_unix(days * 86_400);
            assert_eq!(days_from_civil(t.year, t.month, t.day), days);
        }
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
    }

    #[test]
    fn test_local_time_follows_daylight_saving() {
        let berlin = TimeZone::parse("CET-1CEST,M3.5.0,M10.5.0/3").unwrap();
        let mut c = Clock::new(berlin);
        c.sync(1_711_846_799_000, 0);
        // One second apart, an hour apart on the wall
        assert_eq!(c.iso8601(0).unwrap().as_str(), "2024-03-31T01:59:59");
        assert_eq!(c.iso8601(1_000).unwrap().as_str(), "2024-03-31T03:00:00");
        assert_eq!(
            history_header(Some(1_711_846_800), &berlin).as_str(),
            "[ 03/31 03:00:00 ]"
        );
    }

    #[test]
    fn test_unsynced_formats() {
        let c = Clock::new(TimeZone::UTC);
        assert_eq!(c.hhmm(5_000).as_str(), "--:--");
        assert_eq!(c.iso8601(5_000), None);
        assert_eq!(history_header(None, &TimeZone::UTC).as_str(), "[ --/-- --:--:-- ]");
    }

    #[test]
    fn test_synced_formats() {
        let mut c = Clock::new(TimeZone::fixed(60));
        // Synced 10 s after boot
        c.sync(1_700_000_000_000, 10_000);
        assert_eq!(c.unix_secs(10_000), Some(1_700_000_000));
        assert_eq!(c.hhmm(70_000).as_str(), "23:14");
        assert_eq!(c.date(70_000).as_str(), "2023-11-14");
        assert_eq!(c.iso8601(10_000).unwrap().as_str(), "2023-11-14T23:13:20");
        assert_eq!(
            history_header(Some(1_700_000_000), &TimeZone::UTC).as_str(),
            "[ 11/14 22:13:20 ]"
        );
    }
}
