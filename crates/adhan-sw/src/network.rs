//! Network access.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::request::{Request, Response, ResponseType};
use crate::{Result, SwError};

/// Performs the real network request behind an intercepted fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request`. `Err` means the network itself failed; HTTP error
    /// statuses are returned as `Ok` responses.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Fetcher backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    scope: Url,
}

impl HttpFetcher {
    /// Create a fetcher. Responses from `scope`'s origin are typed basic,
    /// everything else cors.
    pub fn new(scope: Url) -> Self {
        Self::with_client(reqwest::Client::new(), scope)
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client, scope: Url) -> Self {
        Self { client, scope }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        trace!(method = %request.method, url = %request.url, "Network fetch");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| SwError::network(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| SwError::network(e.to_string()))?;

        let response_type = if request.is_same_origin(&self.scope) {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        Ok(Response {
            status,
            headers,
            body,
            response_type,
            url: Some(url),
        })
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Response),
    Fail(String),
}

/// Fetcher answering from a fixed table of URLs.
///
/// Unknown URLs fail like an unreachable host. Used by the harness and by
/// tests to simulate CDN outages and offline periods.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: RwLock<HashMap<String, Scripted>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    calls_by_url: RwLock<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub async fn respond(&self, url: &str, response: Response) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), Scripted::Respond(response));
    }

    /// Fail requests for `url` with a network error.
    pub async fn fail(&self, url: &str, reason: &str) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), Scripted::Fail(reason.to_string()));
    }

    /// Fail every request while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total fetches attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches attempted for one URL.
    pub async fn calls_for(&self, url: &str) -> usize {
        self.calls_by_url
            .read()
            .await
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = request.url.as_str();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_url
            .write()
            .await
            .entry(url.to_string())
            .or_insert(0) += 1;

        if self.offline.load(Ordering::SeqCst) {
            return Err(SwError::network("offline"));
        }

        match self.routes.read().await.get(url) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail(reason)) => Err(SwError::network(reason.clone())),
            None => Err(SwError::network(format!("no route to {url}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetcher_same_origin_is_basic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let scope = Url::parse(&format!("{}/", server.uri())).unwrap();
        let fetcher = HttpFetcher::new(scope.clone());
        let request = Request::get(scope.join("index.html").unwrap());

        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.text(), "<html></html>");
    }

    #[tokio::test]
    async fn test_http_fetcher_keeps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Url::parse("https://app.example.org/").unwrap());
        let request = Request::get(Url::parse(&format!("{}/api/times", server.uri())).unwrap());

        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.response_type, ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_http_fetcher_unreachable_host() {
        let fetcher = HttpFetcher::new(Url::parse("https://app.example.org/").unwrap());
        let request = Request::get(Url::parse("http://127.0.0.1:9/").unwrap());

        assert!(matches!(fetcher.fetch(&request).await, Err(SwError::Network(_))));
    }

    #[tokio::test]
    async fn test_scripted_fetcher() {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("https://a.test/", Response::ok("a")).await;
        fetcher.fail("https://b.test/", "reset").await;

        let a = Request::get(Url::parse("https://a.test/").unwrap());
        let b = Request::get(Url::parse("https://b.test/").unwrap());

        assert!(fetcher.fetch(&a).await.is_ok());
        assert!(fetcher.fetch(&b).await.is_err());

        fetcher.set_offline(true);
        assert!(fetcher.fetch(&a).await.is_err());
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(fetcher.calls_for("https://a.test/").await, 2);
    }
}
