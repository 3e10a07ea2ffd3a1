//! Value coercions.
//!
//! Pure conversions from the textual value of a matched node into a typed
//! [`Scalar`]. Input that cannot be interpreted yields
//! [`Scalar::Unparseable`] instead of an error.
//!
//! HL7 `TS` literals carry their own precision: `1999` names a year,
//! `199911` a month, `19991101` a day, and so on.
//!
//! | Digits | Resolution |
//! |--------|------------|
//! | 4 | `year` |
//! | 6 | `month` |
//! | 8 | `day` |
//! | 10 | `hour` |
//! | 12 | `minute` |
//! | 14 (+ fraction) | `second` |

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::value::Scalar;

static TS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\.\d+)?(?:([+-])(\d{2})(\d{2})?)?$",
    )
    .expect("timestamp pattern is valid")
});

/// HL7 `PostalAddressUse` / `TelecommunicationAddressUse` labels.
pub static ADDRESS_USE: &[(&str, &str)] = &[
    ("H", "home"),
    ("HP", "primary home"),
    ("HV", "vacation home"),
    ("WP", "work place"),
    ("DIR", "direct"),
    ("PUB", "public"),
    ("BAD", "bad address"),
    ("TMP", "temporary address"),
    ("AS", "answering service"),
    ("EC", "emergency contact"),
    ("MC", "mobile contact"),
    ("PG", "pager"),
];

/// How precisely a timestamp literal was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampResolution {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimestampResolution {
    fn from_digits(digits: usize) -> Option<Self> {
        match digits {
            4 => Some(TimestampResolution::Year),
            6 => Some(TimestampResolution::Month),
            8 => Some(TimestampResolution::Day),
            10 => Some(TimestampResolution::Hour),
            12 => Some(TimestampResolution::Minute),
            n if n >= 14 => Some(TimestampResolution::Second),
            _ => None,
        }
    }
}

impl fmt::Display for TimestampResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampResolution::Year => write!(f, "year"),
            TimestampResolution::Month => write!(f, "month"),
            TimestampResolution::Day => write!(f, "day"),
            TimestampResolution::Hour => write!(f, "hour"),
            TimestampResolution::Minute => write!(f, "minute"),
            TimestampResolution::Second => write!(f, "second"),
        }
    }
}

/// Parses an HL7 `TS` literal into a UTC instant and its resolution.
///
/// Missing components default to the start of the period. A literal without
/// an offset is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<(DateTime<Utc>, TimestampResolution)> {
    let caps = TS_PATTERN.captures(raw.trim())?;
    let part = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month = part(2, 1)?;
    let day = part(3, 1)?;
    let hour = part(4, 0)?;
    let minute = part(5, 0)?;
    let second = part(6, 0)?;
    let nanos = match caps.get(7) {
        Some(m) => {
            let digits: String = m.as_str()[1..].chars().take(9).collect();
            let scale = 10u32.pow(9 - digits.len() as u32);
            digits.parse::<u32>().ok()? * scale
        }
        None => 0,
    };

    let digits = (1..=6)
        .filter_map(|i| caps.get(i))
        .map(|m| m.as_str().len())
        .sum();
    let resolution = TimestampResolution::from_digits(digits)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_nano_opt(hour, minute, second, nanos)?;

    let offset_seconds = match (caps.get(8), caps.get(9)) {
        (Some(sign), Some(hh)) => {
            let hours: i32 = hh.as_str().parse().ok()?;
            let minutes: i32 = match caps.get(10) {
                Some(mm) => mm.as_str().parse().ok()?,
                None => 0,
            };
            let total = hours * 3600 + minutes * 60;
            if sign.as_str() == "-" { -total } else { total }
        }
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let instant = offset.from_local_datetime(&naive).single()?;

    Some((instant.with_timezone(&Utc), resolution))
}

/// A conversion applied to the textual value of a matched node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coercion {
    /// Decimal number.
    Float,
    /// HL7 `TS` literal as an instant.
    Timestamp,
    /// HL7 `TS` literal as its resolution tag.
    TimestampResolution,
    /// Trimmed text.
    Text,
    /// A code mapped to a label through a static table; unknown codes pass
    /// through unchanged.
    Lookup(&'static [(&'static str, &'static str)]),
}

impl Coercion {
    pub fn apply(&self, raw: &str) -> Scalar {
        let trimmed = raw.trim();
        match self {
            Coercion::Float => match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Scalar::Number(n),
                _ => Scalar::Unparseable(raw.to_string()),
            },
            Coercion::Timestamp => match parse_timestamp(trimmed) {
                Some((ts, _)) => Scalar::Timestamp(ts),
                None => Scalar::Unparseable(raw.to_string()),
            },
            Coercion::TimestampResolution => match parse_timestamp(trimmed) {
                Some((_, resolution)) => Scalar::Text(resolution.to_string()),
                None => Scalar::Unparseable(raw.to_string()),
            },
            Coercion::Text => Scalar::Text(trimmed.to_string()),
            Coercion::Lookup(table) => {
                let label = table
                    .iter()
                    .find(|(code, _)| *code == trimmed)
                    .map(|(_, label)| *label)
                    .unwrap_or(trimmed);
                Scalar::Text(label.to_string())
            }
        }
    }
}
