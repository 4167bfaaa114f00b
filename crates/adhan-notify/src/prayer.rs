//! The five daily prayers and the timings table posted by the page.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{NotifyError, Result};

/// A daily prayer, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    /// All prayers in the order they are scheduled.
    pub const ALL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// Key used in the timings table and in notification tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    /// Arabic display name.
    pub fn arabic_name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "الفجر",
            Prayer::Dhuhr => "الظهر",
            Prayer::Asr => "العصر",
            Prayer::Maghrib => "المغرب",
            Prayer::Isha => "العشاء",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prayer {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self> {
        Prayer::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| NotifyError::UnknownPrayer(s.to_string()))
    }
}

/// Parse the leading `H:MM` / `HH:MM` token of a timing string.
///
/// Anything after the first whitespace is ignored, so `"05:12 (EET)"` parses
/// as 05:12. Fields after the minutes are ignored too: `"04:10:30"` is 04:10.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let token = raw
        .split_whitespace()
        .next()
        .ok_or_else(|| NotifyError::invalid_time(raw))?;

    let mut fields = token.split(':');
    let (Some(hours), Some(minutes)) = (fields.next(), fields.next()) else {
        return Err(NotifyError::invalid_time(raw));
    };

    let hours: u32 = hours.parse().map_err(|_| NotifyError::invalid_time(raw))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| NotifyError::invalid_time(raw))?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| NotifyError::invalid_time(raw))
}

/// Timings table as posted by the page.
///
/// The page forwards whatever its timings API returned, so the table may
/// carry extra keys (Sunrise, Imsak, ...) and non-string values. Only the
/// five prayer keys are ever read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrayerTimings {
    entries: HashMap<String, Value>,
}

impl PrayerTimings {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, prayer: Prayer, time: impl Into<String>) -> Self {
        self.insert(prayer, time);
        self
    }

    /// Set the raw timing string for a prayer.
    pub fn insert(&mut self, prayer: Prayer, time: impl Into<String>) {
        self.entries
            .insert(prayer.as_str().to_string(), Value::String(time.into()));
    }

    /// Raw entry for a prayer. `null` counts as missing.
    pub fn raw(&self, prayer: Prayer) -> Option<&Value> {
        self.entries.get(prayer.as_str()).filter(|v| !v.is_null())
    }

    /// Parsed time of day for a prayer.
    ///
    /// `None` when the entry is missing; `Some(Err(_))` when it is present
    /// but not a usable time.
    pub fn time_of(&self, prayer: Prayer) -> Option<Result<NaiveTime>> {
        self.raw(prayer).map(|value| match value.as_str() {
            Some(s) => parse_time_of_day(s),
            None => Err(NotifyError::invalid_time(value.to_string())),
        })
    }

    /// Number of prayer entries present.
    pub fn prayer_count(&self) -> usize {
        Prayer::ALL
            .iter()
            .filter(|p| self.raw(**p).is_some())
            .count()
    }
}
