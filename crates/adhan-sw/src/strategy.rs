//! Fetch strategies.
//!
//! Network reads are fallible and cache writes are best-effort: neither a
//! failed fetch nor a failed write ever rejects the intercepted request.
//! Every path ends in a response, the offline page being the last resort.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cache::CacheStorage;
use crate::classify::{Route, Strategy};
use crate::config::WorkerConfig;
use crate::event::ExtendableEvent;
use crate::network::Fetcher;
use crate::offline::offline_response;
use crate::request::{Request, Response};

/// Executes a route's strategy against its namespace.
#[derive(Clone)]
pub struct StrategyEngine {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetcher>,
}

impl StrategyEngine {
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

    /// Answer `request` according to `route`. Background work is registered
    /// on `event`.
    pub async fn execute(
        &self,
        route: Route,
        request: &Request,
        event: &mut ExtendableEvent,
    ) -> Response {
        let cache = self.config.cache_name(route.namespace);
        match route.strategy {
            Strategy::CacheFirst => self.cache_first(&cache, request).await,
            Strategy::NetworkFirst => self.network_first(&cache, request).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(&cache, request, event).await
            }
        }
    }

    /// Serve from cache; on a miss fetch, store a 200 and return it.
    pub async fn cache_first(&self, cache: &str, request: &Request) -> Response {
        if let Some(hit) = self.lookup(cache, request).await {
            trace!(%cache, url = %request.url, "Cache hit");
            return hit;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable_success() {
                    self.store(cache, request, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed on cache miss");
                // another fetch may have filled the cache meanwhile
                match self.lookup(cache, request).await {
                    Some(hit) => hit,
                    None => offline_response(),
                }
            }
        }
    }

    /// Fetch first; store a 200, pass other statuses through untouched,
    /// fall back to cache and then the offline page when the network fails.
    pub async fn network_first(&self, cache: &str, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable_success() {
                    self.store(cache, request, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                match self.lookup(cache, request).await {
                    Some(hit) => hit,
                    None => offline_response(),
                }
            }
        }
    }

    /// Serve the cached copy immediately and refresh it in the background;
    /// on a miss wait for the network.
    pub async fn stale_while_revalidate(
        &self,
        cache: &str,
        request: &Request,
        event: &mut ExtendableEvent,
    ) -> Response {
        let cached = self.lookup(cache, request).await;
        let revalidate = self.clone().revalidate(cache.to_string(), request.clone());

        match cached {
            Some(hit) => {
                trace!(%cache, url = %request.url, "Serving stale, revalidating");
                event.wait_until(async move {
                    revalidate.await;
                });
                hit
            }
            None => revalidate.await.unwrap_or_else(offline_response),
        }
    }

    async fn revalidate(self, cache: String, request: Request) -> Option<Response> {
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable_success() {
                    self.store(&cache, &request, &response).await;
                }
                Some(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Revalidation failed");
                self.lookup(&cache, &request).await
            }
        }
    }

    async fn lookup(&self, cache: &str, request: &Request) -> Option<Response> {
        match self.caches.match_in(cache, request).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(%cache, url = %request.url, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn store(&self, cache: &str, request: &Request, response: &Response) {
        if let Err(e) = self.caches.put(cache, request, response.clone()).await {
            warn!(%cache, url = %request.url, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::network::ScriptedFetcher;
    use crate::request::ResponseType;
    use http::StatusCode;
    use url::Url;

    const CACHE: &str = "islamic-app-core-v1";

    struct Fixture {
        caches: Arc<MemoryCacheStorage>,
        network: Arc<ScriptedFetcher>,
        engine: StrategyEngine,
    }

    fn fixture_with(caches: MemoryCacheStorage) -> Fixture {
        let caches = Arc::new(caches);
        let network = Arc::new(ScriptedFetcher::new());
        let engine = StrategyEngine::new(
            Arc::new(WorkerConfig::default()),
            caches.clone(),
            network.clone(),
        );
        Fixture {
            caches,
            network,
            engine,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryCacheStorage::new())
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let f = fixture();
        let request = get("http://localhost/app.js");
        f.caches.put(CACHE, &request, Response::ok("cached")).await.unwrap();
        f.network.respond("http://localhost/app.js", Response::ok("fresh")).await;

        let response = f.engine.cache_first(CACHE, &request).await;

        assert_eq!(response.text(), "cached");
        assert_eq!(f.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let f = fixture();
        let request = get("http://localhost/app.js");
        f.network.respond("http://localhost/app.js", Response::ok("fresh")).await;

        let response = f.engine.cache_first(CACHE, &request).await;

        assert_eq!(response.text(), "fresh");
        let stored = f.caches.match_in(CACHE, &request).await.unwrap().unwrap();
        assert_eq!(stored, response);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_opaque_or_errors() {
        let f = fixture();
        let opaque = get("http://localhost/opaque.js");
        let missing = get("http://localhost/missing.js");
        f.network.respond(opaque.url.as_str(), Response::opaque()).await;
        f.network
            .respond(missing.url.as_str(), Response::new(StatusCode::NOT_FOUND, "nope"))
            .await;

        assert_eq!(
            f.engine.cache_first(CACHE, &opaque).await.response_type,
            ResponseType::Opaque
        );
        assert_eq!(
            f.engine.cache_first(CACHE, &missing).await.status,
            StatusCode::NOT_FOUND
        );
        assert!(f.caches.entries_in(CACHE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_serves_offline_page() {
        let f = fixture();
        f.network.set_offline(true);

        let response = f.engine.cache_first(CACHE, &get("http://localhost/app.js")).await;
        assert_eq!(response, offline_response());
    }

    #[tokio::test]
    async fn test_network_first_stores_what_it_returns() {
        let f = fixture();
        let request = get("http://localhost/");
        f.network
            .respond(
                "http://localhost/",
                Response::ok("<html>v2</html>").with_content_type("text/html"),
            )
            .await;

        let response = f.engine.network_first(CACHE, &request).await;

        let stored = f.caches.match_in(CACHE, &request).await.unwrap().unwrap();
        assert_eq!(stored, response);
    }

    #[tokio::test]
    async fn test_network_first_passes_errors_through_uncached() {
        let f = fixture();
        let request = get("http://localhost/");
        f.caches.put(CACHE, &request, Response::ok("old")).await.unwrap();
        f.network
            .respond("http://localhost/", Response::new(StatusCode::BAD_GATEWAY, "bad"))
            .await;

        let response = f.engine.network_first(CACHE, &request).await;

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        let stored = f.caches.match_in(CACHE, &request).await.unwrap().unwrap();
        assert_eq!(stored.text(), "old");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache_then_offline() {
        let f = fixture();
        let cached = get("http://localhost/");
        f.caches.put(CACHE, &cached, Response::ok("old")).await.unwrap();
        f.network.set_offline(true);

        assert_eq!(f.engine.network_first(CACHE, &cached).await.text(), "old");

        let uncached = get("http://localhost/index.html");
        let response = f.engine.network_first(CACHE, &uncached).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_failed_cache_write_still_returns_response() {
        let f = fixture_with(MemoryCacheStorage::with_quota(0));
        let request = get("http://localhost/app.js");
        f.network.respond("http://localhost/app.js", Response::ok("fresh")).await;

        let response = f.engine.cache_first(CACHE, &request).await;

        assert_eq!(response.text(), "fresh");
        assert!(f.caches.match_in(CACHE, &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swr_serves_stale_and_refreshes_in_background() {
        let f = fixture();
        let url = "https://fonts.googleapis.com/css2?family=Amiri";
        let request = get(url);
        f.caches.put(CACHE, &request, Response::ok("stale")).await.unwrap();
        f.network.respond(url, Response::ok("fresh")).await;

        let mut event = ExtendableEvent::new();
        let response = f.engine.stale_while_revalidate(CACHE, &request, &mut event).await;

        assert_eq!(response.text(), "stale");
        assert_eq!(f.network.calls(), 0);
        assert_eq!(event.pending(), 1);

        event.settle().await;
        assert_eq!(f.network.calls(), 1);
        let stored = f.caches.match_in(CACHE, &request).await.unwrap().unwrap();
        assert_eq!(stored.text(), "fresh");
    }

    #[tokio::test]
    async fn test_swr_miss_waits_for_network() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/s/cairo.woff2";
        let request = get(url);
        f.network.respond(url, Response::ok("font")).await;

        let mut event = ExtendableEvent::new();
        let response = f.engine.stale_while_revalidate(CACHE, &request, &mut event).await;

        assert_eq!(response.text(), "font");
        assert_eq!(event.pending(), 0);
        assert!(f.caches.match_in(CACHE, &request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_swr_failed_refresh_keeps_cached_copy() {
        let f = fixture();
        let request = get("https://fonts.gstatic.com/s/cairo.woff2");
        f.caches.put(CACHE, &request, Response::ok("stale")).await.unwrap();
        f.network.set_offline(true);

        let mut event = ExtendableEvent::new();
        let response = f.engine.stale_while_revalidate(CACHE, &request, &mut event).await;
        event.settle().await;

        assert_eq!(response.text(), "stale");
        let stored = f.caches.match_in(CACHE, &request).await.unwrap().unwrap();
        assert_eq!(stored.text(), "stale");
    }

    #[tokio::test]
    async fn test_swr_miss_offline_serves_offline_page() {
        let f = fixture();
        f.network.set_offline(true);

        let mut event = ExtendableEvent::new();
        let response = f
            .engine
            .stale_while_revalidate(CACHE, &get("https://fonts.gstatic.com/x.woff2"), &mut event)
            .await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
