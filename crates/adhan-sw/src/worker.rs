//! The worker: one handler per event kind.

use std::sync::Arc;

use adhan_notify::{
    Capabilities, Clock, Notification, NotificationStore, ScheduleReport, Scheduler, SystemClock,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStorage;
use crate::classify::Classifier;
use crate::clients::ClientHost;
use crate::config::WorkerConfig;
use crate::event::{Dispatch, ExtendableEvent, FetchResponse, WorkerEvent};
use crate::lifecycle::{Lifecycle, LifecycleEvent, WorkerState};
use crate::message::Command;
use crate::namespace::{ActivateReport, InstallReport, NamespaceManager};
use crate::network::Fetcher;
use crate::push::{click_target, focus_or_open, notification_from_push, ClickOutcome};
use crate::request::Request;
use crate::strategy::StrategyEngine;
use crate::{Result, SwError};

/// Host facilities the worker runs against.
#[derive(Clone)]
pub struct WorkerServices {
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Fetcher>,
    pub notifications: Arc<dyn NotificationStore>,
    pub capabilities: Arc<dyn Capabilities>,
    pub clients: Arc<dyn ClientHost>,
    pub clock: Arc<dyn Clock>,
}

impl WorkerServices {
    /// Services using the system clock.
    pub fn new(
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
        notifications: Arc<dyn NotificationStore>,
        capabilities: Arc<dyn Capabilities>,
        clients: Arc<dyn ClientHost>,
    ) -> Self {
        Self {
            caches,
            network,
            notifications,
            capabilities,
            clients,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

struct WorkerInner {
    config: Arc<WorkerConfig>,
    lifecycle: Lifecycle,
    namespaces: NamespaceManager,
    classifier: Classifier,
    engine: StrategyEngine,
    scheduler: Scheduler,
    notifications: Arc<dyn NotificationStore>,
    clients: Arc<dyn ClientHost>,
}

/// The offline worker. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ServiceWorker {
    inner: Arc<WorkerInner>,
}

impl ServiceWorker {
    /// Build a worker in `Parsed` state.
    ///
    /// Returns the worker and the receiver of its lifecycle events.
    pub fn new(
        config: WorkerConfig,
        services: WorkerServices,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LifecycleEvent>)> {
        config.validate()?;
        let config = Arc::new(config);
        let (lifecycle, events) = Lifecycle::new();

        let scheduler = Scheduler::new(
            Arc::new(config.reminders.clone()),
            config.scope.origin().ascii_serialization(),
            services.notifications.clone(),
            services.capabilities,
        )
        .with_clock(services.clock);

        let inner = WorkerInner {
            namespaces: NamespaceManager::new(
                config.clone(),
                services.caches.clone(),
                services.network.clone(),
            ),
            classifier: Classifier::new(config.clone()),
            engine: StrategyEngine::new(config.clone(), services.caches, services.network),
            scheduler,
            notifications: services.notifications,
            clients: services.clients,
            lifecycle,
            config,
        };

        info!(
            version = %inner.config.version,
            scope = %inner.config.scope,
            "Worker created"
        );
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            events,
        ))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub async fn state(&self) -> WorkerState {
        self.inner.lifecycle.state().await
    }

    /// Handle one event.
    ///
    /// Fetch responses are produced before this returns. Everything else the
    /// handler started is registered on the returned lifetime, which the
    /// caller must settle before the worker may stop.
    pub async fn dispatch(&self, event: WorkerEvent) -> Dispatch {
        debug!(event = event.name(), "Dispatching event");
        let mut lifetime = ExtendableEvent::new();

        let response = match event {
            WorkerEvent::Install => {
                let worker = self.clone();
                lifetime.wait_until(async move {
                    worker.install().await;
                });
                None
            }
            WorkerEvent::Activate => {
                let worker = self.clone();
                lifetime.wait_until(async move {
                    worker.activate().await;
                });
                None
            }
            WorkerEvent::Fetch(request) => Some(self.fetch(&request, &mut lifetime).await),
            WorkerEvent::Message(message) => {
                self.message(&message, &mut lifetime).await;
                None
            }
            WorkerEvent::Push(data) => {
                self.push(data.as_deref(), &mut lifetime);
                None
            }
            WorkerEvent::NotificationClick(notification) => {
                let worker = self.clone();
                lifetime.wait_until(async move {
                    if let Err(e) = worker.notification_click(notification).await {
                        error!(error = %e, "Notification click failed");
                    }
                });
                None
            }
        };

        Dispatch { response, lifetime }
    }

    /// Populate every namespace, then ask to activate without waiting.
    pub async fn install(&self) -> InstallReport {
        let lifecycle = &self.inner.lifecycle;
        lifecycle.set_state(WorkerState::Installing).await;

        let report = self.inner.namespaces.install().await;

        lifecycle.set_state(WorkerState::Installed).await;
        lifecycle.skip_waiting();
        report
    }

    /// Delete stale namespaces, then take control of every open page.
    pub async fn activate(&self) -> ActivateReport {
        let lifecycle = &self.inner.lifecycle;
        lifecycle.set_state(WorkerState::Activating).await;

        let report = self.inner.namespaces.purge_stale().await;
        lifecycle.publish(LifecycleEvent::NamespacesPurged {
            deleted: report.deleted.clone(),
        });

        match self.inner.clients.claim().await {
            Ok(count) => {
                info!(count, "Claimed clients");
                lifecycle.publish(LifecycleEvent::ClientsClaimed { count });
            }
            Err(e) => warn!(error = %e, "Could not claim clients"),
        }

        lifecycle.set_state(WorkerState::Activated).await;
        report
    }

    /// Answer an intercepted request. Non-GET requests are passed through.
    pub async fn fetch(&self, request: &Request, lifetime: &mut ExtendableEvent) -> FetchResponse {
        match self.inner.classifier.classify(request) {
            None => {
                debug!(method = %request.method, url = %request.url, "Not handled");
                FetchResponse::Passthrough
            }
            Some(route) => {
                debug!(url = %request.url, ?route, "Routing request");
                let response = self.inner.engine.execute(route, request, lifetime).await;
                FetchResponse::Respond(response)
            }
        }
    }

    /// Act on a page message. Unknown or malformed messages are logged and
    /// ignored.
    ///
    /// Reminder commands reserve their scheduler cycle before returning, so
    /// they take effect in the order the messages arrived. Reserving waits
    /// until the previous reminder command's lifetime has settled or is
    /// being driven elsewhere.
    pub async fn message(&self, message: &serde_json::Value, lifetime: &mut ExtendableEvent) {
        let command = match Command::from_message(message) {
            Ok(command) => command,
            Err(SwError::UnknownCommand(kind)) => {
                info!(%kind, "Ignoring unknown message");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed message");
                return;
            }
        };

        match command {
            Command::SkipWaiting => self.inner.lifecycle.skip_waiting(),
            Command::ScheduleNotifications { timings } => {
                let cycle = self.inner.scheduler.begin_cycle().await;
                lifetime.wait_until(async move {
                    log_schedule(&cycle.schedule(&timings).await);
                });
            }
            Command::ClearNotifications => {
                let cycle = self.inner.scheduler.begin_cycle().await;
                lifetime.wait_until(async move {
                    cycle.clear().await;
                });
            }
        }
    }

    /// Show a notification for a push. Returns what will be shown.
    pub fn push(&self, data: Option<&[u8]>, lifetime: &mut ExtendableEvent) -> Notification {
        let notification = notification_from_push(data, &self.inner.config);
        let store = self.inner.notifications.clone();
        let shown = notification.clone();
        lifetime.wait_until(async move {
            if let Err(e) = store.show(shown).await {
                error!(error = %e, "Could not show push notification");
            }
        });
        notification
    }

    /// Close the clicked notification and bring its page to the front.
    pub async fn notification_click(&self, notification: Notification) -> Result<ClickOutcome> {
        if let Some(tag) = notification.tag.as_deref() {
            if let Err(e) = self.inner.notifications.close(tag).await {
                warn!(%tag, error = %e, "Could not close clicked notification");
            }
        }

        let target = click_target(&notification, &self.inner.config);
        let outcome = focus_or_open(self.inner.clients.as_ref(), &target).await?;
        debug!(%target, ?outcome, "Notification click handled");
        Ok(outcome)
    }
}

fn log_schedule(report: &ScheduleReport) {
    match &report.aborted {
        Some(reason) => info!(?reason, "Reminders not scheduled"),
        None => info!(
            scheduled = report.scheduled.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Reminder cycle finished"
        ),
    }
}
