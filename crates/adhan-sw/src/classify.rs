//! Request classification: which namespace, which strategy.

use std::sync::Arc;

use tracing::trace;
use url::Url;

use crate::config::WorkerConfig;
use crate::namespace::Namespace;
use crate::request::Request;

/// Fetch strategy for a class of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache; go to the network only on a miss.
    CacheFirst,
    /// Go to the network; fall back to cache when it fails.
    NetworkFirst,
    /// Serve from cache immediately and refresh it in the background.
    StaleWhileRevalidate,
}

/// Where a request is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub namespace: Namespace,
    pub strategy: Strategy,
}

impl Route {
    const fn new(namespace: Namespace, strategy: Strategy) -> Self {
        Self {
            namespace,
            strategy,
        }
    }
}

/// Picks a route for each intercepted request.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: Arc<WorkerConfig>,
    entry_paths: Vec<String>,
}

impl Classifier {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        let entry_paths = config
            .entry_documents
            .iter()
            .filter_map(|doc| config.scope.join(doc).ok())
            .map(|url| url.path().to_string())
            .collect();

        Self {
            config,
            entry_paths,
        }
    }

    /// Route for `request`, or `None` when the worker should not handle it
    /// at all (anything but GET).
    pub fn classify(&self, request: &Request) -> Option<Route> {
        if !request.is_get() {
            return None;
        }

        let route = if request.is_same_origin(&self.config.scope) {
            self.classify_same_origin(&request.url)
        } else if self.is_external_asset(&request.url) {
            Route::new(Namespace::Fonts, Strategy::StaleWhileRevalidate)
        } else {
            Route::new(Namespace::Api, Strategy::NetworkFirst)
        };

        trace!(url = %request.url, namespace = %route.namespace, strategy = ?route.strategy, "Classified request");
        Some(route)
    }

    fn classify_same_origin(&self, url: &Url) -> Route {
        if self.is_image(url.path()) {
            Route::new(Namespace::Images, Strategy::CacheFirst)
        } else if self.entry_paths.iter().any(|p| p == url.path()) {
            Route::new(Namespace::Core, Strategy::NetworkFirst)
        } else {
            Route::new(Namespace::Core, Strategy::CacheFirst)
        }
    }

    fn is_image(&self, path: &str) -> bool {
        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((_, ext)) => self
                .config
                .image_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn is_external_asset(&self, url: &Url) -> bool {
        self.config
            .external_prefixes
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(
            WorkerConfig::default().with_scope(Url::parse("https://app.example.org/").unwrap()),
        ))
    }

    fn route(url: &str) -> Option<Route> {
        classifier().classify(&Request::get(Url::parse(url).unwrap()))
    }

    #[test]
    fn test_non_get_is_not_handled() {
        let post = Request::new(Method::POST, Url::parse("https://app.example.org/api").unwrap());
        assert_eq!(classifier().classify(&post), None);
    }

    #[test]
    fn test_same_origin_images() {
        for url in [
            "https://app.example.org/icon-192.png",
            "https://app.example.org/img/Mosque.JPG",
            "https://app.example.org/favicon.ico",
            "https://app.example.org/bg.webp?v=3",
        ] {
            assert_eq!(
                route(url),
                Some(Route::new(Namespace::Images, Strategy::CacheFirst)),
                "{url}"
            );
        }
    }

    #[test]
    fn test_entry_document_is_network_first() {
        let expected = Some(Route::new(Namespace::Core, Strategy::NetworkFirst));
        assert_eq!(route("https://app.example.org/"), expected);
        assert_eq!(route("https://app.example.org/index.html"), expected);
        assert_eq!(route("https://app.example.org/?source=pwa"), expected);
    }

    #[test]
    fn test_other_same_origin_is_cache_first() {
        assert_eq!(
            route("https://app.example.org/app.js"),
            Some(Route::new(Namespace::Core, Strategy::CacheFirst))
        );
        assert_eq!(
            route("https://app.example.org/png"),
            Some(Route::new(Namespace::Core, Strategy::CacheFirst))
        );
    }

    #[test]
    fn test_external_assets() {
        assert_eq!(
            route("https://fonts.gstatic.com/s/amiri/v27/J7aRnpd8CGxBHpUrtLMA7w.woff2"),
            Some(Route::new(Namespace::Fonts, Strategy::StaleWhileRevalidate))
        );
        assert_eq!(
            route("https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css"),
            Some(Route::new(Namespace::Fonts, Strategy::StaleWhileRevalidate))
        );
    }

    #[test]
    fn test_other_cross_origin_is_api() {
        assert_eq!(
            route("https://api.aladhan.com/v1/timingsByCity?city=Cairo&country=Egypt"),
            Some(Route::new(Namespace::Api, Strategy::NetworkFirst))
        );
        // cross-origin images are not the images namespace
        assert_eq!(
            route("https://cdn.example.net/logo.png"),
            Some(Route::new(Namespace::Api, Strategy::NetworkFirst))
        );
    }

    #[test]
    fn test_scoped_entry_documents() {
        let classifier = Classifier::new(Arc::new(
            WorkerConfig::default()
                .with_scope(Url::parse("https://user.github.io/salah/").unwrap()),
        ));
        let request = Request::get(Url::parse("https://user.github.io/salah/").unwrap());
        assert_eq!(
            classifier.classify(&request),
            Some(Route::new(Namespace::Core, Strategy::NetworkFirst))
        );

        let root = Request::get(Url::parse("https://user.github.io/").unwrap());
        assert_eq!(
            classifier.classify(&root),
            Some(Route::new(Namespace::Core, Strategy::CacheFirst))
        );
    }
}
