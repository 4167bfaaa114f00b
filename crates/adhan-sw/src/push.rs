//! Push payloads and notification clicks.

use std::sync::atomic::{AtomicU64, Ordering};

use adhan_notify::{Notification, NotificationData};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::clients::ClientHost;
use crate::config::WorkerConfig;
use crate::Result;

static PUSH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Tag unique to one push, so its notification can be closed on click.
fn push_tag(prefix: &str) -> String {
    let seq = PUSH_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{}-{seq}", Utc::now().timestamp_millis())
}

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

/// Build the notification to show for a push.
///
/// A JSON object payload supplies any of `title`, `body` and `url`; anything
/// else is taken as the body text. Missing parts come from the configured
/// defaults, so a push always yields a notification.
pub fn notification_from_push(data: Option<&[u8]>, config: &WorkerConfig) -> Notification {
    let payload = match data {
        None => PushPayload::default(),
        Some(bytes) => serde_json::from_slice::<PushPayload>(bytes).unwrap_or_else(|e| {
            debug!(error = %e, "Push payload is not JSON, using it as body text");
            PushPayload {
                body: Some(String::from_utf8_lossy(bytes).into_owned()),
                ..Default::default()
            }
        }),
    };

    let push = &config.push;
    Notification {
        tag: Some(push_tag(&push.tag_prefix)),
        title: payload.title.unwrap_or_else(|| push.default_title.clone()),
        body: payload.body.unwrap_or_else(|| push.default_body.clone()),
        icon: Some(config.reminders.icon.clone()),
        badge: Some(config.reminders.badge.clone()),
        vibrate: config.reminders.vibrate.clone(),
        show_trigger: None,
        data: NotificationData {
            url: Some(payload.url.unwrap_or_else(|| push.default_url.clone())),
        },
    }
}

/// URL a clicked notification should bring up.
pub fn click_target(notification: &Notification, config: &WorkerConfig) -> Url {
    let raw = notification.data.url.as_deref().unwrap_or("/");
    match config.scope.join(raw) {
        Ok(url) => url,
        Err(e) => {
            warn!(url = raw, error = %e, "Unusable notification URL, opening scope");
            config.scope.clone()
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened(String),
}

/// Focus the first window whose path matches `target`'s path, or open a new
/// window at `target`.
pub async fn focus_or_open(clients: &dyn ClientHost, target: &Url) -> Result<ClickOutcome> {
    let windows = clients.match_all(true).await?;

    if let Some(window) = windows.iter().find(|c| c.url.path() == target.path()) {
        let focused = clients.focus(&window.id).await?;
        debug!(id = %focused.id, "Focused existing window");
        return Ok(ClickOutcome::Focused(focused.id));
    }

    let opened = clients.open_window(target).await?;
    Ok(ClickOutcome::Opened(opened.id))
}
