//! # Adhan Notify
//!
//! Prayer reminder scheduling for the offline worker.
//!
//! The scheduler turns a `prayer name -> "HH:MM"` mapping posted by the page
//! into five trigger-backed notifications. Every cycle first closes the
//! notifications left by the previous one, so re-running it with the same
//! timings never leaves duplicates behind.
//!
//! ```text
//! Unscheduled ──schedule()──► Pending(tag, instant) ──platform──► Fired
//!                                   │
//!                                   └──clear()/next cycle──► Cleared
//! ```
//!
//! Platform access goes through two traits so the scheduler can run without
//! a browser: [`NotificationStore`] (show, list by tag prefix, close) and
//! [`Capabilities`] (permission and timed-trigger support).

use thiserror::Error;

pub mod capability;
pub mod prayer;
pub mod scheduler;
pub mod store;
pub mod trigger;

pub use capability::{Capabilities, NotificationPermission, StaticCapabilities};
pub use prayer::{parse_time_of_day, Prayer, PrayerTimings};
pub use scheduler::{
    AbortReason, Cycle, ReminderConfig, ScheduleReport, ScheduledPrayer, Scheduler,
};
pub use store::{MemoryNotificationStore, Notification, NotificationData, NotificationStore};
pub use trigger::{next_trigger, Clock, FixedClock, SystemClock};

/// Errors raised by the reminder layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Unknown prayer: {0}")]
    UnknownPrayer(String),

    #[error("Local time {0} does not exist in this time zone")]
    NoLocalTime(String),

    #[error("Notification store error: {0}")]
    Store(String),
}

impl NotifyError {
    /// Create an invalid-time error.
    pub fn invalid_time(msg: impl Into<String>) -> Self {
        Self::InvalidTime(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

/// Result type alias for reminder operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
