//! Events delivered to the worker and the lifetime-extension contract.

use std::fmt;
use std::future::Future;

use adhan_notify::Notification;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::request::{Request, Response};

/// An event delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    /// Structured message posted by a controlled page.
    Message(Value),
    /// Raw push payload, if the push carried one.
    Push(Option<Vec<u8>>),
    NotificationClick(Notification),
}

impl WorkerEvent {
    /// Event name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Message(_) => "message",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick(_) => "notificationclick",
        }
    }

    /// Lifecycle events must settle before the next event is delivered.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, WorkerEvent::Install | WorkerEvent::Activate)
    }
}

/// Answer to an intercepted fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// The worker produced this response.
    Respond(Response),
    /// The worker declined; the host performs its default fetch.
    Passthrough,
}

impl FetchResponse {
    /// The response, if the worker produced one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchResponse::Respond(response) => Some(response),
            FetchResponse::Passthrough => None,
        }
    }
}

/// Work an event handler started that must finish before the worker may be
/// stopped.
#[derive(Default)]
pub struct ExtendableEvent {
    pending: Vec<BoxFuture<'static, ()>>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the worker alive until `future` completes.
    pub fn wait_until<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.push(future.boxed());
    }

    /// Number of registered futures.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drive every registered future to completion. Returns how many there were.
    pub async fn settle(self) -> usize {
        let count = self.pending.len();
        join_all(self.pending).await;
        count
    }
}

impl fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Result of dispatching one event.
#[derive(Debug)]
pub struct Dispatch {
    /// Set for fetch events only.
    pub response: Option<FetchResponse>,
    pub lifetime: ExtendableEvent,
}
