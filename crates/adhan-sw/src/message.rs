//! Commands posted by the controlling page.

use adhan_notify::PrayerTimings;
use serde::Deserialize;
use serde_json::Value;

use crate::{Result, SwError};

/// A command from the page, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Activate the waiting worker now.
    SkipWaiting,
    /// Replace pending prayer reminders using these timings.
    ScheduleNotifications { timings: PrayerTimings },
    /// Close all pending prayer reminders.
    ClearNotifications,
}

impl Command {
    const KNOWN: [&'static str; 3] = [
        "SKIP_WAITING",
        "SCHEDULE_NOTIFICATIONS",
        "CLEAR_NOTIFICATIONS",
    ];

    /// Decode a posted message.
    ///
    /// Unknown `type` values yield [`SwError::UnknownCommand`]; a known type
    /// with a bad payload yields [`SwError::InvalidMessage`].
    pub fn from_message(message: &Value) -> Result<Self> {
        let kind = message
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SwError::InvalidMessage("missing string field `type`".to_string()))?;

        if !Self::KNOWN.contains(&kind) {
            return Err(SwError::UnknownCommand(kind.to_string()));
        }

        Self::deserialize(message).map_err(|e| SwError::InvalidMessage(e.to_string()))
    }
}
