//! End-to-end worker scenarios against in-memory backends.

use std::sync::Arc;

use adhan_notify::{FixedClock, MemoryNotificationStore, NotificationStore, StaticCapabilities};
use adhan_sw::{
    CacheStorage, ClientHost, FetchResponse, MemoryCacheStorage, MemoryClients, Request, Response,
    ScriptedFetcher, ServiceWorker, WorkerConfig, WorkerEvent, WorkerRuntime, WorkerServices,
    WorkerState,
};
use chrono::{FixedOffset, TimeZone, Utc};
use http::StatusCode;
use serde_json::json;
use url::Url;

const SCOPE: &str = "https://app.example.org/";

struct Host {
    caches: Arc<MemoryCacheStorage>,
    network: Arc<ScriptedFetcher>,
    notifications: Arc<MemoryNotificationStore>,
    clients: Arc<MemoryClients>,
}

impl Host {
    fn new() -> Self {
        Self {
            caches: Arc::new(MemoryCacheStorage::new()),
            network: Arc::new(ScriptedFetcher::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
            clients: Arc::new(MemoryClients::new()),
        }
    }

    async fn serve_app_shell(&self) {
        for path in ["", "index.html", "manifest.json", "icon-192.png"] {
            self.network
                .respond(&format!("{SCOPE}{path}"), Response::ok(format!("v1 {path}")))
                .await;
        }
    }

    fn worker(&self, version: &str) -> ServiceWorker {
        let clock = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 10, 0, 0)
            .unwrap();
        let services = WorkerServices::new(
            self.caches.clone(),
            self.network.clone(),
            self.notifications.clone(),
            Arc::new(StaticCapabilities::granted()),
            self.clients.clone(),
        )
        .with_clock(Arc::new(FixedClock(clock)));
        let config = WorkerConfig::default()
            .with_scope(Url::parse(SCOPE).unwrap())
            .with_version(version);
        ServiceWorker::new(config, services).unwrap().0
    }
}

fn url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

fn timings() -> serde_json::Value {
    timings_with_fajr("04:10")
}

fn timings_with_fajr(fajr: &str) -> serde_json::Value {
    json!({
        "type": "SCHEDULE_NOTIFICATIONS",
        "timings": {
            "Fajr": fajr, "Sunrise": "05:41", "Dhuhr": "12:50",
            "Asr": "16:30", "Maghrib": "19:55", "Isha": "21:25"
        }
    })
}

#[tokio::test]
async fn version_bump_purges_previous_namespaces() {
    let host = Host::new();
    host.serve_app_shell().await;

    let (v1, _) = WorkerRuntime::spawn(host.worker("v1"));
    v1.send(WorkerEvent::Install).await.unwrap();
    v1.shutdown().await.unwrap();
    assert!(host.caches.has("islamic-app-core-v1").await.unwrap());

    let v2 = host.worker("v2");
    let (handle, _) = WorkerRuntime::spawn(v2.clone());
    handle.send(WorkerEvent::Install).await.unwrap();

    assert_eq!(v2.state().await, WorkerState::Activated);
    let names = host.caches.keys().await.unwrap();
    assert_eq!(
        names,
        vec![
            "islamic-app-api-v2",
            "islamic-app-core-v2",
            "islamic-app-fonts-v2",
            "islamic-app-images-v2",
        ]
    );
}

#[tokio::test]
async fn offline_navigation_without_cache_gets_offline_page() {
    let host = Host::new();
    host.network.set_offline(true);
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));

    let response = handle
        .fetch(Request::navigate(url("./")))
        .await
        .unwrap()
        .into_response()
        .unwrap();

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
    assert!(response.text().contains("dir=\"rtl\""));
}

#[tokio::test]
async fn offline_navigation_after_install_serves_cached_shell() {
    let host = Host::new();
    host.serve_app_shell().await;
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));
    handle.send(WorkerEvent::Install).await.unwrap();

    host.network.set_offline(true);
    let response = handle
        .fetch(Request::navigate(url("./index.html")))
        .await
        .unwrap()
        .into_response()
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "v1 index.html");
}

#[tokio::test]
async fn cached_images_never_touch_the_network() {
    let host = Host::new();
    host.serve_app_shell().await;
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));
    handle.send(WorkerEvent::Install).await.unwrap();
    let icon = url("./icon-192.png");
    let before = host.network.calls_for(icon.as_str()).await;

    for _ in 0..3 {
        handle.fetch(Request::get(icon.clone())).await.unwrap();
    }

    assert_eq!(host.network.calls_for(icon.as_str()).await, before);
}

#[tokio::test]
async fn opaque_api_responses_are_not_cached() {
    let host = Host::new();
    let api = "https://api.aladhan.com/v1/timingsByCity?city=Cairo&country=Egypt";
    host.network.respond(api, Response::opaque()).await;
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));

    let answer = handle.fetch(Request::get(Url::parse(api).unwrap())).await.unwrap();

    assert!(matches!(answer, FetchResponse::Respond(_)));
    assert!(host
        .caches
        .entries_in("islamic-app-api-v1")
        .await
        .map(|entries| entries.is_empty())
        .unwrap_or(true));
}

#[tokio::test]
async fn rescheduling_never_leaves_ten_reminders() {
    let host = Host::new();
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));

    handle.send(WorkerEvent::Message(timings())).await.unwrap();
    handle.send(WorkerEvent::Message(timings())).await.unwrap();
    handle.flush().await.unwrap();

    let pending = host.notifications.list_by_tag_prefix("adhan-").await.unwrap();
    assert_eq!(pending.len(), 5);
    let titles: Vec<_> = pending.iter().map(|n| n.title.as_str()).collect();
    assert!(titles.contains(&"حان الآن موعد أذان الفجر"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clear_after_schedule_always_wins() {
    let host = Host::new();
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));

    for _ in 0..100 {
        handle.send(WorkerEvent::Message(timings())).await.unwrap();
        handle
            .send(WorkerEvent::Message(json!({"type": "CLEAR_NOTIFICATIONS"})))
            .await
            .unwrap();
        handle.flush().await.unwrap();

        let left = host.notifications.list_by_tag_prefix("adhan-").await.unwrap();
        assert!(left.is_empty(), "{} reminders left after clear", left.len());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn later_schedule_always_wins() {
    let host = Host::new();
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));
    // Clock is 2024-06-15 10:00 +03:00, so Fajr rolls to the next day.
    let latest_fajr = Utc.with_ymd_and_hms(2024, 6, 16, 1, 20, 0).unwrap();

    for _ in 0..100 {
        handle
            .send(WorkerEvent::Message(timings_with_fajr("04:10")))
            .await
            .unwrap();
        handle
            .send(WorkerEvent::Message(timings_with_fajr("04:20")))
            .await
            .unwrap();
        handle.flush().await.unwrap();

        let pending = host.notifications.list_by_tag_prefix("adhan-").await.unwrap();
        assert_eq!(pending.len(), 5);
        let fajr = pending
            .iter()
            .find(|n| n.has_tag_prefix("adhan-Fajr-"))
            .unwrap();
        assert_eq!(fajr.show_trigger, Some(latest_fajr));
    }
}

#[tokio::test]
async fn push_then_click_opens_the_target() {
    let host = Host::new();
    host.clients.add_window(url("./settings")).await;
    let (handle, _) = WorkerRuntime::spawn(host.worker("v1"));

    let payload = json!({"title": "Ramadan", "body": "Suhoor ends soon", "url": "/ramadan"});
    handle
        .send(WorkerEvent::Push(Some(payload.to_string().into_bytes())))
        .await
        .unwrap();
    handle.flush().await.unwrap();

    let shown = host.notifications.all().await;
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Ramadan");

    handle
        .send(WorkerEvent::NotificationClick(shown[0].clone()))
        .await
        .unwrap();
    handle.flush().await.unwrap();

    assert!(host.notifications.is_empty().await);

    let windows = host.clients.match_all(true).await.unwrap();
    assert_eq!(windows.len(), 2);
    let opened = windows.iter().find(|c| c.focused).unwrap();
    assert_eq!(opened.url.as_str(), "https://app.example.org/ramadan");
}
