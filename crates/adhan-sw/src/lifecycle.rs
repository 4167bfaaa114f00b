//! Worker lifecycle state.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Script evaluated, no event handled yet.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Stopped or replaced.
    Redundant,
}

/// Lifecycle notifications for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StateChange { from: WorkerState, to: WorkerState },
    NamespacesPurged { deleted: Vec<String> },
    ClientsClaimed { count: usize },
}

/// Lifecycle state plus the skip-waiting flag.
#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl Lifecycle {
    /// Create a lifecycle in `Parsed` state, with the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: RwLock::new(WorkerState::Parsed),
                skip_waiting: AtomicBool::new(false),
                events,
            },
            rx,
        )
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Check if active.
    pub async fn is_active(&self) -> bool {
        self.state().await == WorkerState::Activated
    }

    /// Move to `to` and publish the change.
    pub async fn set_state(&self, to: WorkerState) {
        let from = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            debug!(?from, ?to, "Worker state changed");
            self.publish(LifecycleEvent::StateChange { from, to });
        }
    }

    /// Ask to activate as soon as installation completes, without waiting
    /// for older workers to release their pages.
    pub fn skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            info!("Skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Installed and allowed to activate now.
    pub async fn ready_to_activate(&self) -> bool {
        self.skip_waiting_requested() && self.state().await == WorkerState::Installed
    }

    /// Publish an event. A host that dropped the receiver is not an error.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.events.send(event);
    }
}
