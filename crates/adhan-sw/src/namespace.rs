//! Versioned cache namespaces: population on install, purge on activate.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::network::Fetcher;
use crate::request::Request;
use crate::SwError;

/// One of the four caches the worker owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// App shell: entry document, manifest, same-origin scripts and styles.
    Core,
    Images,
    /// Third-party font and icon stylesheets.
    Fonts,
    /// Cross-origin API responses.
    Api,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Core,
        Namespace::Images,
        Namespace::Fonts,
        Namespace::Api,
    ];

    /// Identifier used inside the versioned cache name.
    pub fn id(&self) -> &'static str {
        match self {
            Namespace::Core => "core",
            Namespace::Images => "images",
            Namespace::Fonts => "fonts",
            Namespace::Api => "api",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome of populating the namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Asset URLs stored.
    pub cached: Vec<String>,
    /// Asset URLs that could not be fetched or stored, with the reason.
    pub failed: Vec<(String, SwError)>,
}

/// Outcome of purging stale namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

/// Owns the four versioned caches.
#[derive(Clone)]
pub struct NamespaceManager {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetcher>,
}

impl NamespaceManager {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            caches,
            network,
        }
    }

    /// Versioned names the current configuration declares.
    pub fn declared_names(&self) -> Vec<String> {
        self.config.cache_names()
    }

    /// Open every namespace and fill it from its asset list.
    ///
    /// A failing asset is logged and reported; it never stops the others.
    pub async fn install(&self) -> InstallReport {
        let mut jobs = Vec::new();
        for namespace in Namespace::ALL {
            let name = self.config.cache_name(namespace);
            if let Err(e) = self.caches.open(&name).await {
                warn!(cache = %name, error = %e, "Could not open cache");
            }
            for asset in self.config.assets.for_namespace(namespace) {
                let name = name.clone();
                let asset = asset.clone();
                jobs.push(async move {
                    let outcome = self.populate(&name, &asset).await;
                    (asset, outcome)
                });
            }
        }

        let mut report = InstallReport::default();
        for (asset, outcome) in join_all(jobs).await {
            match outcome {
                Ok(()) => report.cached.push(asset),
                Err(e) => {
                    warn!(%asset, error = %e, "Failed to cache asset");
                    report.failed.push((asset, e));
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Namespaces populated"
        );
        report
    }

    async fn populate(&self, cache: &str, asset: &str) -> crate::Result<()> {
        let url = self.config.resolve(asset)?;
        let request = Request::get(url);
        let response = self.network.fetch(&request).await?;
        if !response.is_ok() {
            return Err(SwError::network(format!(
                "{} answered {}",
                request.url, response.status
            )));
        }
        self.caches.put(cache, &request, response).await?;
        debug!(%cache, url = %request.url, "Cached asset");
        Ok(())
    }

    /// Delete every cache whose name is not one of the declared names.
    pub async fn purge_stale(&self) -> ActivateReport {
        let declared = self.declared_names();
        let existing = match self.caches.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Could not list caches, nothing purged");
                return ActivateReport::default();
            }
        };

        let mut report = ActivateReport::default();
        for name in existing {
            if declared.contains(&name) {
                report.kept.push(name);
                continue;
            }
            match self.caches.delete(&name).await {
                Ok(_) => {
                    info!(cache = %name, "Deleted stale cache");
                    report.deleted.push(name);
                }
                Err(e) => warn!(cache = %name, error = %e, "Could not delete stale cache"),
            }
        }
        report
    }
}
