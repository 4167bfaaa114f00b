//! Sequential event loop hosting a [`ServiceWorker`].
//!
//! Events are handled strictly in arrival order on a single task. Install
//! and activate lifetimes settle before the next event is taken; the
//! lifetimes of other events run in the background and are awaited on
//! [`WorkerHandle::flush`] or [`WorkerHandle::shutdown`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::event::{FetchResponse, WorkerEvent};
use crate::lifecycle::WorkerState;
use crate::request::Request;
use crate::worker::ServiceWorker;
use crate::{Result, SwError};

const QUEUE_DEPTH: usize = 64;

enum Envelope {
    Event {
        event: WorkerEvent,
        reply: oneshot::Sender<Option<FetchResponse>>,
    },
    Flush {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Owns the worker and its outstanding lifetimes.
pub struct WorkerRuntime {
    worker: ServiceWorker,
    rx: mpsc::Receiver<Envelope>,
    pending: JoinSet<usize>,
    handled: usize,
}

impl WorkerRuntime {
    /// Start the event loop on the current tokio runtime.
    ///
    /// The join handle yields the number of events handled once the loop
    /// stops, either on shutdown or when every handle is dropped.
    pub fn spawn(worker: ServiceWorker) -> (WorkerHandle, JoinHandle<usize>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let runtime = Self {
            worker,
            rx,
            pending: JoinSet::new(),
            handled: 0,
        };
        let task = tokio::spawn(runtime.run());
        (WorkerHandle { tx }, task)
    }

    async fn run(mut self) -> usize {
        while let Some(envelope) = self.rx.recv().await {
            match envelope {
                Envelope::Event { event, reply } => {
                    self.handle(event, reply).await;
                }
                Envelope::Flush { reply } => {
                    let settled = self.drain().await;
                    let _ = reply.send(settled);
                }
                Envelope::Shutdown { reply } => {
                    let settled = self.stop().await;
                    let _ = reply.send(settled);
                    return self.handled;
                }
            }
        }

        self.stop().await;
        self.handled
    }

    async fn handle(&mut self, event: WorkerEvent, reply: oneshot::Sender<Option<FetchResponse>>) {
        let lifecycle = event.is_lifecycle();
        let dispatch = self.worker.dispatch(event).await;
        self.handled += 1;

        if lifecycle {
            dispatch.lifetime.settle().await;
            self.activate_if_ready().await;
            let _ = reply.send(dispatch.response);
        } else {
            let _ = reply.send(dispatch.response);
            if dispatch.lifetime.pending() > 0 {
                self.pending.spawn(dispatch.lifetime.settle());
            }
            self.activate_if_ready().await;
        }

        self.reap();
    }

    /// Run activation as soon as an installed worker asked to skip waiting.
    async fn activate_if_ready(&mut self) {
        if !self.worker.lifecycle().ready_to_activate().await {
            return;
        }
        debug!("Activating without waiting");
        let dispatch = self.worker.dispatch(WorkerEvent::Activate).await;
        dispatch.lifetime.settle().await;
        self.handled += 1;
    }

    fn reap(&mut self) {
        while let Some(result) = self.pending.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Event lifetime task failed");
            }
        }
    }

    async fn drain(&mut self) -> usize {
        let mut settled = 0;
        while let Some(result) = self.pending.join_next().await {
            match result {
                Ok(count) => settled += count,
                Err(e) => error!(error = %e, "Event lifetime task failed"),
            }
        }
        settled
    }

    async fn stop(&mut self) -> usize {
        let settled = self.drain().await;
        self.worker.lifecycle().set_state(WorkerState::Redundant).await;
        info!(handled = self.handled, settled, "Worker stopped");
        settled
    }
}

/// Sends events to a running [`WorkerRuntime`].
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Deliver an event and wait until it has been dispatched.
    ///
    /// For install and activate this also waits for their work to finish.
    /// Returns the fetch response for fetch events.
    pub async fn send(&self, event: WorkerEvent) -> Result<Option<FetchResponse>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Event { event, reply })
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Deliver a fetch event.
    pub async fn fetch(&self, request: Request) -> Result<FetchResponse> {
        let response = self.send(WorkerEvent::Fetch(request)).await?;
        Ok(response.unwrap_or(FetchResponse::Passthrough))
    }

    /// Wait for every background lifetime started so far. Returns how many
    /// futures settled.
    pub async fn flush(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Flush { reply })
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Settle all outstanding work and stop the worker.
    pub async fn shutdown(self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Shutdown { reply })
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }
}

fn stopped() -> SwError {
    SwError::State("worker stopped".to_string())
}
