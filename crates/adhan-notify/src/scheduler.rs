//! Prayer reminder scheduler.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::capability::Capabilities;
use crate::prayer::{Prayer, PrayerTimings};
use crate::store::{Notification, NotificationData, NotificationStore};
use crate::trigger::{next_trigger, Clock, SystemClock};
use crate::NotifyError;

/// Presentation and tagging of prayer reminders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Prefix shared by every reminder tag.
    pub tag_prefix: String,
    /// Title text placed before the prayer's display name.
    pub title_prefix: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "adhan-".to_string(),
            title_prefix: "حان الآن موعد أذان".to_string(),
            body: "اضغط لفتح التطبيق".to_string(),
            icon: "icon-192.png".to_string(),
            badge: "icon-192.png".to_string(),
            vibrate: vec![200, 100, 200],
        }
    }
}

impl ReminderConfig {
    /// Localized title for a prayer.
    pub fn title_for(&self, prayer: Prayer) -> String {
        format!("{} {}", self.title_prefix, prayer.arabic_name())
    }

    /// Tag unique per prayer and trigger instant.
    pub fn tag_for(&self, prayer: Prayer, at: DateTime<Utc>) -> String {
        format!("{}{}-{}", self.tag_prefix, prayer, at.timestamp_millis())
    }
}

/// Why a scheduling attempt did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    PermissionNotGranted,
    TriggersUnsupported,
    /// Previous reminders could not be listed, so new ones were not added.
    ClearFailed(String),
}

/// One registered reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPrayer {
    pub prayer: Prayer,
    pub tag: String,
    pub at: DateTime<FixedOffset>,
}

/// Outcome of a scheduling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Reminders from the previous cycle that were closed.
    pub cleared: usize,
    pub scheduled: Vec<ScheduledPrayer>,
    /// Prayers with no entry in the timings table.
    pub skipped: Vec<Prayer>,
    pub failed: Vec<(Prayer, NotifyError)>,
    pub aborted: Option<AbortReason>,
}

impl ScheduleReport {
    fn aborted(reason: AbortReason) -> Self {
        Self {
            aborted: Some(reason),
            ..Default::default()
        }
    }

    /// Trigger instant registered for a prayer in this cycle.
    pub fn trigger_for(&self, prayer: Prayer) -> Option<DateTime<FixedOffset>> {
        self.scheduled
            .iter()
            .find(|s| s.prayer == prayer)
            .map(|s| s.at)
    }
}

/// Registers one trigger-backed notification per prayer.
#[derive(Clone)]
pub struct Scheduler {
    config: Arc<ReminderConfig>,
    open_url: String,
    store: Arc<dyn NotificationStore>,
    capabilities: Arc<dyn Capabilities>,
    clock: Arc<dyn Clock>,
    /// Held for a whole clear-then-register cycle.
    cycle: Arc<Mutex<()>>,
}

impl Scheduler {
    /// Create a scheduler using the system clock. `open_url` is stored in
    /// each reminder and opened when it is clicked.
    pub fn new(
        config: Arc<ReminderConfig>,
        open_url: impl Into<String>,
        store: Arc<dyn NotificationStore>,
        capabilities: Arc<dyn Capabilities>,
    ) -> Self {
        Self {
            config,
            open_url: open_url.into(),
            store,
            capabilities,
            clock: Arc::new(SystemClock),
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Reserve the next cycle.
    ///
    /// Cycles run in the order they were reserved, whatever order their
    /// futures are later polled in.
    pub async fn begin_cycle(&self) -> Cycle {
        Cycle {
            scheduler: self.clone(),
            _guard: self.cycle.clone().lock_owned().await,
        }
    }

    /// Replace the previous cycle's reminders with one per prayer in `timings`.
    ///
    /// Never fails: a missing capability aborts the whole cycle, a bad or
    /// missing prayer entry only affects that prayer. Old reminders are closed
    /// before any new one is registered.
    pub async fn schedule(&self, timings: &PrayerTimings) -> ScheduleReport {
        self.begin_cycle().await.schedule(timings).await
    }

    /// Close every pending reminder without scheduling new ones.
    pub async fn clear(&self) -> usize {
        self.begin_cycle().await.clear().await
    }

    async fn run_schedule(&self, timings: &PrayerTimings) -> ScheduleReport {
        if !self.capabilities.permission_granted() {
            info!("Notification permission not granted, reminders not scheduled");
            return ScheduleReport::aborted(AbortReason::PermissionNotGranted);
        }
        if !self.capabilities.supports_timed_trigger() {
            warn!("Notification triggers are not supported, reminders not scheduled");
            return ScheduleReport::aborted(AbortReason::TriggersUnsupported);
        }

        let cleared = match self.close_existing().await {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Could not list previous reminders");
                return ScheduleReport::aborted(AbortReason::ClearFailed(e.to_string()));
            }
        };
        info!(cleared, "Cleared previous prayer reminders");

        let now = self.clock.now();
        let mut report = ScheduleReport {
            cleared,
            ..Default::default()
        };

        for prayer in Prayer::ALL {
            let time = match timings.time_of(prayer) {
                None => {
                    debug!(%prayer, "No timing for prayer, skipping");
                    report.skipped.push(prayer);
                    continue;
                }
                Some(Err(e)) => {
                    error!(%prayer, error = %e, "Error scheduling reminder");
                    report.failed.push((prayer, e));
                    continue;
                }
                Some(Ok(time)) => time,
            };

            let Some(at) = next_trigger(&now, time) else {
                let e = NotifyError::NoLocalTime(time.to_string());
                error!(%prayer, error = %e, "Error scheduling reminder");
                report.failed.push((prayer, e));
                continue;
            };

            let notification = self.reminder(prayer, at.with_timezone(&Utc));
            let tag = notification.tag.clone().unwrap_or_default();

            match self.store.show(notification).await {
                Ok(()) => {
                    info!(%prayer, %at, "Scheduled prayer reminder");
                    report.scheduled.push(ScheduledPrayer { prayer, tag, at });
                }
                Err(e) => {
                    error!(%prayer, error = %e, "Error scheduling reminder");
                    report.failed.push((prayer, e));
                }
            }
        }

        report
    }

    async fn run_clear(&self) -> usize {
        match self.close_existing().await {
            Ok(count) => {
                info!(cleared = count, "Cleared prayer reminders");
                count
            }
            Err(e) => {
                error!(error = %e, "Could not list reminders to clear");
                0
            }
        }
    }

    async fn close_existing(&self) -> crate::Result<usize> {
        let existing = self
            .store
            .list_by_tag_prefix(&self.config.tag_prefix)
            .await?;

        let mut closed = 0;
        for notification in existing {
            let Some(tag) = notification.tag else { continue };
            match self.store.close(&tag).await {
                Ok(true) => closed += 1,
                Ok(false) => debug!(%tag, "Reminder already gone"),
                Err(e) => warn!(%tag, error = %e, "Could not close reminder"),
            }
        }
        Ok(closed)
    }

    fn reminder(&self, prayer: Prayer, at: DateTime<Utc>) -> Notification {
        Notification {
            tag: Some(self.config.tag_for(prayer, at)),
            title: self.config.title_for(prayer),
            body: self.config.body.clone(),
            icon: Some(self.config.icon.clone()),
            badge: Some(self.config.badge.clone()),
            vibrate: self.config.vibrate.clone(),
            show_trigger: Some(at),
            data: NotificationData {
                url: Some(self.open_url.clone()),
            },
        }
    }
}

/// Exclusive right to run one clear or schedule cycle.
pub struct Cycle {
    scheduler: Scheduler,
    _guard: OwnedMutexGuard<()>,
}

impl Cycle {
    pub async fn schedule(self, timings: &PrayerTimings) -> ScheduleReport {
        self.scheduler.run_schedule(timings).await
    }

    pub async fn clear(self) -> usize {
        self.scheduler.run_clear().await
    }
}
