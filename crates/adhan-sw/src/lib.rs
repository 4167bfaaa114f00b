//! # Adhan Service Worker
//!
//! Offline resilience and reminder layer of the prayer-times web app.
//!
//! ## Features
//!
//! - **Namespaces**: four versioned caches (core, images, fonts, api),
//!   populated on install and purged of old versions on activate
//! - **Routing**: every GET is classified into a namespace and a strategy
//! - **Strategies**: cache-first, network-first, stale-while-revalidate
//! - **Offline page**: a fixed 503 document when network and cache both fail
//! - **Messages**: `SKIP_WAITING`, `SCHEDULE_NOTIFICATIONS`, `CLEAR_NOTIFICATIONS`
//! - **Push / click**: push payloads become notifications, clicks focus or
//!   open the app window
//!
//! ## Architecture
//!
//! ```text
//! WorkerRuntime (one event at a time)
//!     │
//!     └── ServiceWorker::dispatch(WorkerEvent) ──► Dispatch { response, lifetime }
//!             ├── install/activate ──► NamespaceManager ──► CacheStorage
//!             ├── fetch ──► Classifier ──► StrategyEngine ──► Fetcher / CacheStorage
//!             ├── message ──► Command ──► Scheduler (adhan-notify) / Lifecycle
//!             └── push/click ──► NotificationStore / ClientHost
//! ```
//!
//! Asynchronous work that must finish before the worker may be stopped is
//! registered on the event's [`ExtendableEvent`]; the runtime keeps the
//! worker alive until every registered future settles.

use thiserror::Error;

pub mod cache;
pub mod classify;
pub mod clients;
pub mod config;
pub mod event;
pub mod lifecycle;
pub mod message;
pub mod namespace;
pub mod network;
pub mod offline;
pub mod push;
pub mod request;
pub mod runtime;
pub mod strategy;
pub mod worker;

pub use cache::{CacheKey, CacheStorage, MemoryCacheStorage};
pub use classify::{Classifier, Route, Strategy};
pub use clients::{Client, ClientHost, ClientType, MemoryClients};
pub use config::{NamespaceAssets, PushConfig, WorkerConfig};
pub use event::{Dispatch, ExtendableEvent, FetchResponse, WorkerEvent};
pub use lifecycle::{Lifecycle, LifecycleEvent, WorkerState};
pub use message::Command;
pub use namespace::{ActivateReport, InstallReport, Namespace, NamespaceManager};
pub use network::{Fetcher, HttpFetcher, ScriptedFetcher};
pub use offline::{offline_response, OFFLINE_HTML};
pub use push::{notification_from_push, ClickOutcome};
pub use request::{Request, RequestMode, Response, ResponseType};
pub use runtime::{WorkerHandle, WorkerRuntime};
pub use strategy::StrategyEngine;
pub use worker::{ServiceWorker, WorkerServices};

// ==================== Errors ====================

/// Errors that can occur in worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Notification error: {0}")]
    Notification(#[from] adhan_notify::NotifyError),
}

impl SwError {
    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a client error.
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }
}

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, SwError>;
