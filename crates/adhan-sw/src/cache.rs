//! Named response caches.
//!
//! ```text
//! CacheStorage
//!     └── cache name (e.g. islamic-app-core-v1)
//!             └── CacheKey (method + URL) → CacheEntry
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use http::Method;
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::request::{Request, Response};
use crate::{Result, SwError};

/// Normalized lookup key: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}

impl CacheKey {
    /// Key for a request.
    pub fn for_request(request: &Request) -> Self {
        Self {
            method: request.method.clone(),
            url: normalize(&request.url),
        }
    }
}

fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

/// Versioned caches of responses, keyed by cache name.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist.
    async fn open(&self, name: &str) -> Result<()>;

    /// Whether the named cache exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete the named cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of every cache.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Look a request up in one cache.
    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Store a response, replacing any previous entry for the same key.
    /// Only GET requests can be stored.
    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()>;

    /// Keys stored in one cache.
    async fn entries_in(&self, name: &str) -> Result<Vec<CacheKey>>;
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<CacheKey, CacheEntry>,
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, Cache>>,
    /// Maximum entries per cache; `None` is unbounded.
    quota: Option<usize>,
}

impl MemoryCacheStorage {
    /// Create empty, unbounded storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage whose caches hold at most `max_entries` each.
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            caches: RwLock::default(),
            quota: Some(max_entries),
        }
    }

    /// When an entry was stored.
    pub async fn cached_at(&self, name: &str, request: &Request) -> Option<DateTime<Utc>> {
        let caches = self.caches.read().await;
        caches
            .get(name)?
            .entries
            .get(&CacheKey::for_request(request))
            .map(|e| e.cached_at)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(name)
            .and_then(|c| c.entries.get(&CacheKey::for_request(request)))
            .map(|e| e.response.clone()))
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
        if !request.is_get() {
            return Err(SwError::cache(format!(
                "refusing to store {} {}",
                request.method, request.url
            )));
        }

        let key = CacheKey::for_request(request);
        let mut caches = self.caches.write().await;
        let cache = caches.entry(name.to_string()).or_default();

        if let Some(max) = self.quota {
            if !cache.entries.contains_key(&key) && cache.entries.len() >= max {
                return Err(SwError::cache(format!("quota of {max} entries exceeded in {name}")));
            }
        }

        trace!(cache = name, url = %key.url, "Stored response");
        cache.entries.insert(
            key,
            CacheEntry {
                response,
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn entries_in(&self, name: &str) -> Result<Vec<CacheKey>> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(name)
            .map(|c| c.entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://example.com/style.css");

        storage
            .put("v1", &request, Response::ok("body{}"))
            .await
            .unwrap();

        let hit = storage.match_in("v1", &request).await.unwrap().unwrap();
        assert_eq!(hit.text(), "body{}");
        assert!(storage
            .match_in("v1", &get("https://example.com/other.css"))
            .await
            .unwrap()
            .is_none());
        assert!(storage.cached_at("v1", &request).await.is_some());
    }

    #[tokio::test]
    async fn test_fragment_is_ignored() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("v1", &get("https://example.com/#top"), Response::ok("home"))
            .await
            .unwrap();

        assert!(storage
            .match_in("v1", &get("https://example.com/"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_only_get_is_stored() {
        let storage = MemoryCacheStorage::new();
        let post = Request::new(Method::POST, Url::parse("https://example.com/api").unwrap());

        let result = storage.put("v1", &post, Response::ok("")).await;
        assert!(matches!(result, Err(SwError::Cache(_))));
        assert!(!storage.has("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_open_delete_keys() {
        let storage = MemoryCacheStorage::new();
        assert!(!storage.has("v1").await.unwrap());

        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_quota_allows_overwrite() {
        let storage = MemoryCacheStorage::with_quota(1);
        let a = get("https://example.com/a");

        storage.put("v1", &a, Response::ok("1")).await.unwrap();
        storage.put("v1", &a, Response::ok("2")).await.unwrap();
        assert!(storage
            .put("v1", &get("https://example.com/b"), Response::ok("3"))
            .await
            .is_err());

        assert_eq!(storage.entries_in("v1").await.unwrap().len(), 1);
        assert_eq!(storage.match_in("v1", &a).await.unwrap().unwrap().text(), "2");
    }
}
