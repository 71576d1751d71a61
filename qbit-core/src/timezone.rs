//! Time zones as POSIX `TZ` rules
//!
//! Zones are named by IANA id and resolved through a built-in table of the
//! common ones. Rules use the POSIX `TZ` syntax with `Mm.w.d` transitions,
//! e.g. `CET-1CEST,M3.5.0,M10.5.0/3`. Offsets in the rule count west of
//! Greenwich; [`TimeZone`] stores them east-positive.

use crate::clock::{days_from_civil, days_in_month, DateTime};

/// Longest IANA name stored in the settings
pub const MAX_ZONE_NAME: usize = 32;

/// Transition time when a rule leaves it out (02:00 local)
const DEFAULT_TRANSITION_SECS: i32 = 2 * 3600;

const ZONES: [(&str, &str); 28] = [
    ("Pacific/Midway", "SST11"),
    ("Pacific/Honolulu", "HST10"),
    ("America/Anchorage", "AKST9AKDT,M3.2.0,M11.1.0"),
    ("America/Los_Angeles", "PST8PDT,M3.2.0,M11.1.0"),
    ("America/Denver", "MST7MDT,M3.2.0,M11.1.0"),
    ("America/Phoenix", "MST7"),
    ("America/Chicago", "CST6CDT,M3.2.0,M11.1.0"),
    ("America/New_York", "EST5EDT,M3.2.0,M11.1.0"),
    ("America/Sao_Paulo", "<-03>3"),
    ("Atlantic/Reykjavik", "GMT0"),
    ("Europe/London", "GMT0BST,M3.5.0/1,M10.5.0"),
    ("Europe/Paris", "CET-1CEST,M3.5.0,M10.5.0/3"),
    ("Europe/Berlin", "CET-1CEST,M3.5.0,M10.5.0/3"),
    ("Europe/Helsinki", "EET-2EEST,M3.5.0/3,M10.5.0/4"),
    ("Europe/Moscow", "MSK-3"),
    ("Asia/Dubai", "<+04>-4"),
    ("Asia/Kolkata", "IST-5:30"),
    ("Asia/Bangkok", "<+07>-7"),
    ("Asia/Shanghai", "CST-8"),
    ("Asia/Taipei", "CST-8"),
    ("Asia/Hong_Kong", "HKT-8"),
    ("Asia/Singapore", "<+08>-8"),
    ("Asia/Tokyo", "JST-9"),
    ("Asia/Seoul", "KST-9"),
    ("Australia/Sydney", "AEST-10AEDT,M10.1.0,M4.1.0/3"),
    ("Australia/Perth", "AWST-8"),
    ("Pacific/Auckland", "NZST-12NZDT,M9.5.0,M4.1.0/3"),
    ("Etc/UTC", "UTC0"),
];

/// A zone from the built-in table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZoneId(u8);

impl ZoneId {
    /// Look up an IANA name such as `Europe/Berlin`
    pub fn from_iana(name: &str) -> Option<Self> {
        ZONES
            .iter()
            .position(|(iana, _)| *iana == name)
            .map(|i| ZoneId(i as u8))
    }

    pub(crate) fn from_index(index: u8) -> Option<Self> {
        (usize::from(index) < ZONES.len()).then_some(ZoneId(index))
    }

    pub(crate) fn index(self) -> u8 {
        self.0
    }

    pub fn iana(self) -> &'static str {
        ZONES[usize::from(self.0)].0
    }

    pub fn posix(self) -> &'static str {
        ZONES[usize::from(self.0)].1
    }

    /// Parsed rule; every table entry parses
    pub fn rule(self) -> TimeZone {
        TimeZone::parse(self.posix()).unwrap_or(TimeZone::UTC)
    }
}

/// Errors parsing a POSIX rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TzError {
    /// Zone abbreviation missing or shorter than three letters
    Name,
    /// Offset missing or out of range
    Offset,
    /// Daylight saving transition missing or malformed
    Rule,
    /// Text after a complete rule
    Trailing,
}

/// `Mm.w.d/time`: weekday `d` (0 = Sunday) of week `w` (5 = last) of month `m`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Transition {
    month: u8,
    week: u8,
    weekday: u8,
    /// Local wall time of the change, seconds after midnight
    time_secs: i32,
}

impl Transition {
    /// Local seconds since the epoch of this transition in `year`
    fn local_secs(&self, year: i32) -> i64 {
        let first = days_from_civil(year, self.month, 1);
        // 1970-01-01 was a Thursday
        let first_weekday = (first + 4).rem_euclid(7) as u8;
        let mut day = 1 + (self.weekday + 7 - first_weekday) % 7 + (self.week - 1) * 7;
        let last = days_in_month(year, self.month);
        while day > last {
            day -= 7;
        }
        (first + i64::from(day) - 1) * 86_400 + i64::from(self.time_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Daylight {
    offset_secs: i32,
    start: Transition,
    end: Transition,
}

/// UTC offset rule, with optional daylight saving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeZone {
    std_offset_secs: i32,
    dst: Option<Daylight>,
}

impl TimeZone {
    pub const UTC: TimeZone = TimeZone::fixed(0);

    /// Constant offset east of UTC
    pub const fn fixed(offset_minutes: i32) -> Self {
        Self {
            std_offset_secs: offset_minutes * 60,
            dst: None,
        }
    }

    /// Parse a POSIX `TZ` rule
    pub fn parse(rule: &str) -> Result<Self, TzError> {
        let mut c = Cursor {
            s: rule.as_bytes(),
            pos: 0,
        };

        c.name()?;
        let std_offset_secs = -c.offset()?;
        if c.done() {
            return Ok(Self {
                std_offset_secs,
                dst: None,
            });
        }

        c.name()?;
        let offset_secs = if matches!(c.peek(), Some(b'0'..=b'9' | b'+' | b'-')) {
            -c.offset()?
        } else {
            std_offset_secs + 3600
        };
        c.expect(b',', TzError::Rule)?;
        let start = c.transition()?;
        c.expect(b',', TzError::Rule)?;
        let end = c.transition()?;
        if !c.done() {
            return Err(TzError::Trailing);
        }

        Ok(Self {
            std_offset_secs,
            dst: Some(Daylight {
                offset_secs,
                start,
                end,
            }),
        })
    }

    pub fn has_dst(&self) -> bool {
        self.dst.is_some()
    }

    /// Offset east of UTC in effect at `unix_secs`
    pub fn offset_secs(&self, unix_secs: i64) -> i32 {
        let Some(dst) = self.dst else {
            return self.std_offset_secs;
        };
        let year = DateTime::from_unix(unix_secs + i64::from(self.std_offset_secs)).year;
        // Start is given in standard time, end in daylight time
        let start = dst.start.local_secs(year) - i64::from(self.std_offset_secs);
        let end = dst.end.local_secs(year) - i64::from(dst.offset_secs);
        let in_dst = if start < end {
            unix_secs >= start && unix_secs < end
        } else {
            unix_secs >= start || unix_secs < end
        };
        if in_dst {
            dst.offset_secs
        } else {
            self.std_offset_secs
        }
    }
}

struct Cursor<'a> {
    s: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn done(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8, err: TzError) -> Result<(), TzError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(err)
        }
    }

    /// `EST` or a quoted `<-03>`
    fn name(&mut self) -> Result<(), TzError> {
        if self.eat(b'<') {
            while let Some(c) = self.peek() {
                self.pos += 1;
                if c == b'>' {
                    return Ok(());
                }
            }
            return Err(TzError::Name);
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos - start < 3 {
            return Err(TzError::Name);
        }
        Ok(())
    }

    fn number(&mut self, err: TzError) -> Result<i32, TzError> {
        let start = self.pos;
        let mut value = 0i32;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            if self.pos - start == 3 {
                return Err(err);
            }
            value = value * 10 + i32::from(c - b'0');
            self.pos += 1;
        }
        if self.pos == start {
            return Err(err);
        }
        Ok(value)
    }

    /// `[+-]hh[:mm[:ss]]` in seconds
    fn hms(&mut self, err: TzError) -> Result<i32, TzError> {
        let sign = if self.eat(b'-') {
            -1
        } else {
            self.eat(b'+');
            1
        };
        let hours = self.number(err)?;
        let minutes = if self.eat(b':') { self.number(err)? } else { 0 };
        let seconds = if self.eat(b':') { self.number(err)? } else { 0 };
        if hours > 167 || minutes > 59 || seconds > 59 {
            return Err(err);
        }
        Ok(sign * (hours * 3600 + minutes * 60 + seconds))
    }

    fn offset(&mut self) -> Result<i32, TzError> {
        let secs = self.hms(TzError::Offset)?;
        if secs.abs() > 24 * 3600 {
            return Err(TzError::Offset);
        }
        Ok(secs)
    }

    fn transition(&mut self) -> Result<Transition, TzError> {
        self.expect(b'M', TzError::Rule)?;
        let month = self.number(TzError::Rule)?;
        self.expect(b'.', TzError::Rule)?;
        let week = self.number(TzError::Rule)?;
        self.expect(b'.', TzError::Rule)?;
        let weekday = self.number(TzError::Rule)?;
        if !(1..=12).contains(&month) || !(1..=5).contains(&week) || weekday > 6 {
            return Err(TzError::Rule);
        }
        let time_secs = if self.eat(b'/') {
            self.hms(TzError::Rule)?
        } else {
            DEFAULT_TRANSITION_SECS
        };
        Ok(Transition {
            month: month as u8,
            week: week as u8,
            weekday: weekday as u8,
            time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str) -> TimeZone {
        ZoneId::from_iana(name).unwrap().rule()
    }

    #[test]
    fn test_every_table_entry_parses() {
        for (iana, posix) in ZONES {
            assert!(TimeZone::parse(posix).is_ok(), "{} -> {}", iana, posix);
            let id = ZoneId::from_iana(iana).unwrap();
            assert_eq!(id.iana(), iana);
            assert_eq!(ZoneId::from_index(id.index()), Some(id));
        }
        assert_eq!(ZoneId::from_iana("Mars/Olympus_Mons"), None);
        assert_eq!(ZoneId::from_index(ZONES.len() as u8), None);
    }

    #[test]
    fn test_fixed_offsets() {
        assert_eq!(zone("Asia/Kolkata").offset_secs(1_700_000_000), 19_800);
        assert_eq!(zone("America/Sao_Paulo").offset_secs(1_700_000_000), -10_800);
        assert_eq!(zone("Asia/Dubai").offset_secs(0), 14_400);
        assert_eq!(zone("Etc/UTC").offset_secs(1_700_000_000), 0);
        assert!(!zone("Asia/Tokyo").has_dst());
    }

    #[test]
    fn test_central_europe_transitions() {
        let berlin = zone("Europe/Berlin");
        // 2024-03-31 01:00 UTC and 2024-10-27 01:00 UTC
        assert_eq!(berlin.offset_secs(1_711_846_799), 3600);
        assert_eq!(berlin.offset_secs(1_711_846_800), 7200);
        assert_eq!(berlin.offset_secs(1_729_990_799), 7200);
        assert_eq!(berlin.offset_secs(1_729_990_800), 3600);
        // London switches at the same instant
        assert_eq!(zone("Europe/London").offset_secs(1_711_846_800), 3600);
    }

    #[test]
    fn test_us_eastern_transitions() {
        let ny = zone("America/New_York");
        // 2024-03-10 07:00 UTC and 2024-11-03 06:00 UTC
        assert_eq!(ny.offset_secs(1_710_053_999), -18_000);
        assert_eq!(ny.offset_secs(1_710_054_000), -14_400);
        assert_eq!(ny.offset_secs(1_730_613_599), -14_400);
        assert_eq!(ny.offset_secs(1_730_613_600), -18_000);
    }

    #[test]
    fn test_southern_hemisphere_wraps_the_year() {
        let sydney = zone("Australia/Sydney");
        assert_eq!(sydney.offset_secs(1_704_067_200), 39_600);
        assert_eq!(sydney.offset_secs(1_719_792_000), 36_000);
        // 2024-04-06 16:00 UTC and 2024-10-05 16:00 UTC
        assert_eq!(sydney.offset_secs(1_712_419_199), 39_600);
        assert_eq!(sydney.offset_secs(1_712_419_200), 36_000);
        assert_eq!(sydney.offset_secs(1_728_143_999), 36_000);
        assert_eq!(sydney.offset_secs(1_728_144_000), 39_600);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(TimeZone::parse(""), Err(TzError::Name));
        assert_eq!(TimeZone::parse("X5"), Err(TzError::Name));
        assert_eq!(TimeZone::parse("EST"), Err(TzError::Offset));
        assert_eq!(TimeZone::parse("EST5EDT"), Err(TzError::Rule));
        assert_eq!(TimeZone::parse("EST5EDT,M13.1.0,M11.1.0"), Err(TzError::Rule));
        assert_eq!(TimeZone::parse("EST5EDT,M3.2.0,M11.1.0x"), Err(TzError::Trailing));
        assert_eq!(TimeZone::parse("<+07"), Err(TzError::Name));
    }

    #[test]
    fn test_explicit_daylight_offset() {
        // Lord Howe style half-hour shift
        let tz = TimeZone::parse("<+1030>-10:30<+11>-11,M10.1.0,M4.1.0").unwrap();
        assert_eq!(tz.offset_secs(1_719_792_000), 37_800);
        assert_eq!(tz.offset_secs(1_704_067_200), 39_600);
    }
}
