//! Reporting window selection: a fixed days-back window or "today".

use chrono::{DateTime, Duration, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How far back a snapshot reaches. Serialized as the JSON literal `"today"`
/// or a plain integer day count, matching what callers send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateRange {
    Today,
    Days(u32),
}

impl DateRange {
    /// Windows pre-warmed by the background refresh job.
    pub const REFRESH_RANGES: [DateRange; 3] =
        [DateRange::Days(7), DateRange::Days(30), DateRange::Days(90)];

    /// Suffix used in cache keys: `today`, `7`, `30`, ...
    pub fn cache_suffix(&self) -> String {
        match self {
            DateRange::Today => "today".to_string(),
            DateRange::Days(n) => n.to_string(),
        }
    }

    /// Full cache key for a stored snapshot under this window.
    pub fn cache_key(&self) -> String {
        format!("snapshot_{}", self.cache_suffix())
    }

    /// Oldest `created_at` still inside the window. "today" means midnight
    /// of the current day; a day count means a rolling 24h-multiple window.
    pub fn cutoff_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRange::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always a valid time")
                .and_utc(),
            DateRange::Days(n) => now - Duration::days(i64::from(*n)),
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::Days(30)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cache_suffix())
    }
}

impl Serialize for DateRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateRange::Today => serializer.serialize_str("today"),
            DateRange::Days(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RangeVisitor;

        impl<'de> Visitor<'de> for RangeVisitor {
            type Value = DateRange;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("\"today\" or an integer number of days")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DateRange, E> {
                if v.eq_ignore_ascii_case("today") {
                    return Ok(DateRange::Today);
                }
                v.parse::<u32>()
                    .map(DateRange::Days)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DateRange, E> {
                u32::try_from(v)
                    .map(DateRange::Days)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DateRange, E> {
                u32::try_from(v)
                    .map(DateRange::Days)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(RangeVisitor)
    }
}
