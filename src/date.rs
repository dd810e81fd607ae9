//! Calendar helpers: `YearMonth`, resampling intervals, and date bucketing.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// Simple "YYYY-MM" utility with safe arithmetic and ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: u16,
    pub month: u8, // 1..=12
}

impl YearMonth {
    pub fn of(date: Date) -> Self {
        Self { year: date.year().clamp(0, i32::from(u16::MAX)) as u16, month: date.month() as u8 }
    }

    pub fn next(self) -> Option<Self> {
        if self.month < 12 {
            Some(Self { year: self.year, month: self.month + 1 })
        } else if self.year < u16::MAX {
            Some(Self { year: self.year + 1, month: 1 })
        } else {
            None
        }
    }

    /// Months since year 0.
    fn ordinal(self) -> u32 { u32::from(self.year) * 12 + u32::from(self.month) - 1 }

    fn from_ordinal(n: u32) -> Self { Self { year: (n / 12) as u16, month: (n % 12) as u8 + 1 } }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.split('-').collect();
        if parts.len() != 2 {
            return Err("expected YYYY-MM".into());
        }
        let year: u16 = parts[0].parse().map_err(|_| "invalid year")?;
        let month: u8 = parts[1].parse().map_err(|_| "invalid month")?;
        if !(1..=12).contains(&month) {
            return Err("month must be 01..12".into());
        }
        Ok(Self { year, month })
    }
}

/// Resampling interval: `Nd` days, `Nw` weeks, `NM` months, `Ny` years (N defaults to 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interval {
    Days(u32),
    Months(u32),
}

impl FromStr for Interval {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::Invalid(format!("invalid interval '{s}' (expected e.g. 1d, 2w, 1M, 1y)"));
        let unit = s.chars().last().ok_or_else(invalid)?;
        let digits = &s[..s.len() - unit.len_utf8()];
        let n: u32 = if digits.is_empty() { 1 } else { digits.parse().map_err(|_| invalid())? };
        if n == 0 {
            return Err(invalid());
        }
        let interval = match unit {
            'd' | 'D' => Some(Interval::Days(n)),
            'w' | 'W' => n.checked_mul(7).map(Interval::Days),
            'M' => Some(Interval::Months(n)),
            'y' | 'Y' => n.checked_mul(12).map(Interval::Months),
            _ => None,
        };
        match interval {
            // day bins are stepped in julian days
            Some(Interval::Days(days)) if i32::try_from(days).is_err() => Err(invalid()),
            Some(interval) => Ok(interval),
            None => Err(invalid()),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Days(n) => write!(f, "{n}d"),
            Interval::Months(n) => write!(f, "{n}M"),
        }
    }
}

/// Group `items` into consecutive bins of `interval`, from the bin of the earliest date to the
/// bin of the latest. Empty bins in between are kept. Bins are labelled by their first day
/// (`YYYY-MM-DD`) or month (`YYYY-MM`).
pub fn bucketize<T>(items: impl IntoIterator<Item = (OffsetDateTime, T)>, interval: Interval) -> Vec<(String, Vec<T>)> {
    let items: Vec<(OffsetDateTime, T)> = items.into_iter().collect();
    let Some(first) = items.iter().map(|(d, _)| d.date()).min() else { return Vec::new() };
    let last = items.iter().map(|(d, _)| d.date()).max().unwrap_or(first);

    match interval {
        Interval::Days(n) => {
            let origin = first.to_julian_day();
            let step = i32::try_from(n).unwrap_or(i32::MAX);
            let bin_of = |d: Date| ((d.to_julian_day() - origin) / step) as usize;
            let mut bins: Vec<(String, Vec<T>)> = (0..=bin_of(last))
                .map(|i| {
                    let start = Date::from_julian_day(origin + i as i32 * step).unwrap_or(first);
                    (day_label(start), Vec::new())
                })
                .collect();
            for (d, item) in items {
                bins[bin_of(d.date())].1.push(item);
            }
            bins
        }
        Interval::Months(n) => {
            let origin = YearMonth::of(first).ordinal();
            let bin_of = |d: Date| ((YearMonth::of(d).ordinal() - origin) / n) as usize;
            let mut bins: Vec<(String, Vec<T>)> = (0..=bin_of(last))
                .map(|i| (YearMonth::from_ordinal(origin + i as u32 * n).to_string(), Vec::new()))
                .collect();
            for (d, item) in items {
                bins[bin_of(d.date())].1.push(item);
            }
            bins
        }
    }
}

pub fn day_label(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

/// Parse an RFC 3339 timestamp, a plain `YYYY-MM-DD` date (midnight UTC) or epoch seconds.
pub fn parse_datetime(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(d) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(d);
    }
    if let Ok(secs) = s.parse::<i64>() {
        return OffsetDateTime::from_unix_timestamp(secs).ok();
    }
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(s, &format).ok().map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_utc())
}

/// Whole days from `a` to `b` (negative when `b` is earlier), like a timedelta's `.days`.
pub fn days_between(a: OffsetDateTime, b: OffsetDateTime) -> i64 {
    (b - a).as_seconds_f64().div_euclid(86_400.0) as i64
}
