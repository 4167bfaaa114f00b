//! Notification capability checks.

use serde::{Deserialize, Serialize};

/// Notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// What the hosting runtime allows the scheduler to do.
pub trait Capabilities: Send + Sync {
    /// Whether the user granted notification permission.
    fn permission_granted(&self) -> bool;

    /// Whether notifications can be registered with a future trigger
    /// instead of being shown immediately.
    fn supports_timed_trigger(&self) -> bool;
}

/// Capabilities fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCapabilities {
    pub permission: NotificationPermission,
    pub timed_trigger: bool,
}

impl StaticCapabilities {
    /// Permission granted and timed triggers available.
    pub fn granted() -> Self {
        Self {
            permission: NotificationPermission::Granted,
            timed_trigger: true,
        }
    }

    /// Permission never asked for.
    pub fn undecided() -> Self {
        Self {
            permission: NotificationPermission::Default,
            timed_trigger: true,
        }
    }

    /// Permission granted but the runtime only shows notifications immediately.
    pub fn without_triggers() -> Self {
        Self {
            permission: NotificationPermission::Granted,
            timed_trigger: false,
        }
    }
}

impl Capabilities for StaticCapabilities {
    fn permission_granted(&self) -> bool {
        self.permission == NotificationPermission::Granted
    }

    fn supports_timed_trigger(&self) -> bool {
        self.timed_trigger
    }
}
