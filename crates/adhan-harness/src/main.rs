//! Adhan worker smoke harness
//!
//! Drives the offline worker through install, activation, online and offline
//! fetches, a reminder cycle and a push, all against in-memory backends, then
//! prints a JSON summary on stdout.

use std::sync::Arc;

use adhan_common::{init_logging, LogConfig, LogFormat};
use adhan_notify::{MemoryNotificationStore, NotificationStore, StaticCapabilities};
use adhan_sw::{
    CacheStorage, FetchResponse, MemoryCacheStorage, MemoryClients, Namespace, Request, Response,
    ScriptedFetcher, ServiceWorker, WorkerConfig, WorkerEvent, WorkerRuntime, WorkerServices,
};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default)]
struct Options {
    config: Option<String>,
    cache_version: Option<String>,
    json_logs: bool,
    verbose: bool,
}

impl Options {
    fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Options::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => options.config = Some(args.next().context("--config needs a path")?),
                "--cache-version" => {
                    options.cache_version =
                        Some(args.next().context("--cache-version needs a value")?)
                }
                "--version" => {
                    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                    std::process::exit(0);
                }
                "--json-logs" => options.json_logs = true,
                "--verbose" => options.verbose = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(options)
    }

    fn worker_config(&self) -> Result<WorkerConfig> {
        let mut config = match &self.config {
            Some(path) => WorkerConfig::from_json_file(path)
                .with_context(|| format!("loading {path}"))?,
            None => WorkerConfig::default(),
        };
        if let Some(version) = &self.cache_version {
            config = config.with_version(version.clone());
        }
        Ok(config)
    }

    fn log_config(&self) -> LogConfig {
        let mut log = if self.verbose {
            LogConfig::debug()
        } else {
            LogConfig::default()
        };
        if self.json_logs {
            log.format = LogFormat::Json;
        }
        log
    }
}

fn describe(answer: &FetchResponse) -> Value {
    match answer {
        FetchResponse::Respond(response) => json!({
            "status": response.status.as_u16(),
            "bytes": response.body.len(),
        }),
        FetchResponse::Passthrough => json!("passthrough"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse()?;
    init_logging(options.log_config());
    let config = options.worker_config()?;

    let caches = Arc::new(MemoryCacheStorage::new());
    let network = Arc::new(ScriptedFetcher::new());
    let notifications = Arc::new(MemoryNotificationStore::new());
    let clients = Arc::new(MemoryClients::new());

    for namespace in Namespace::ALL {
        for asset in config.assets.for_namespace(namespace) {
            let url = config.resolve(asset)?;
            network
                .respond(url.as_str(), Response::ok(format!("asset {url}")))
                .await;
        }
    }

    let services = WorkerServices::new(
        caches.clone(),
        network.clone(),
        notifications.clone(),
        Arc::new(StaticCapabilities::granted()),
        clients.clone(),
    );
    let (worker, mut lifecycle) = ServiceWorker::new(config.clone(), services)?;
    let (handle, task) = WorkerRuntime::spawn(worker.clone());

    info!("Installing");
    handle.send(WorkerEvent::Install).await?;

    let home = Request::navigate(config.resolve("./")?);
    let online = handle.fetch(home.clone()).await?;

    network.set_offline(true);
    let offline = handle.fetch(home).await?;
    let missing = handle
        .fetch(Request::navigate(config.resolve("./qibla")?))
        .await?;

    handle
        .send(WorkerEvent::Message(json!({
            "type": "SCHEDULE_NOTIFICATIONS",
            "timings": {
                "Fajr": "04:12", "Sunrise": "05:40", "Dhuhr": "12:51",
                "Asr": "16:28 (EEST)", "Maghrib": "19:57", "Isha": "21:26"
            }
        })))
        .await?;
    handle
        .send(WorkerEvent::Push(Some(br#"{"title":"Jumuah","body":"Surat al-Kahf"}"#.to_vec())))
        .await?;
    handle.flush().await?;

    let reminders = notifications
        .list_by_tag_prefix(&config.reminders.tag_prefix)
        .await?;
    let state = worker.state().await;
    let settled = handle.shutdown().await?;
    let handled = task.await?;

    let mut transitions = 0;
    while lifecycle.try_recv().is_ok() {
        transitions += 1;
    }

    let summary = json!({
        "state_before_shutdown": format!("{state:?}"),
        "caches": caches.keys().await?,
        "network_calls": network.calls(),
        "fetches": {
            "online": describe(&online),
            "offline_cached": describe(&offline),
            "offline_missing": describe(&missing),
        },
        "reminders": reminders
            .iter()
            .map(|n| json!({ "tag": n.tag, "title": n.title }))
            .collect::<Vec<_>>(),
        "notifications_total": notifications.len().await,
        "events_handled": handled,
        "lifetimes_settled": settled,
        "lifecycle_events": transitions,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
