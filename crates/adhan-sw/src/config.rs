//! Worker configuration

use std::path::Path;

use adhan_notify::ReminderConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::namespace::Namespace;
use crate::{Result, SwError};

const DEFAULT_SCOPE: &str = "http://localhost/";

/// Immutable configuration injected when the worker is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Prefix of every cache name, e.g. `islamic-app`
    pub cache_prefix: String,

    /// Cache version; bumping it purges every older cache on activate
    pub version: String,

    /// URL the worker controls. Its origin decides same/cross-origin routing.
    pub scope: Url,

    /// Assets fetched into each namespace on install
    pub assets: NamespaceAssets,

    /// Cross-origin URL prefixes routed to the fonts namespace
    pub external_prefixes: Vec<String>,

    /// Entry documents, relative to `scope`, served network-first
    pub entry_documents: Vec<String>,

    /// Same-origin path extensions routed to the images namespace
    pub image_extensions: Vec<String>,

    /// Prayer reminder presentation
    pub reminders: ReminderConfig,

    /// Push fallback values
    pub push: PushConfig,
}

/// Static assets per namespace. Relative entries resolve against the scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceAssets {
    pub core: Vec<String>,
    pub images: Vec<String>,
    pub fonts: Vec<String>,
    pub api: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Prefix of push notification tags. Must differ from the reminder prefix.
    pub tag_prefix: String,
    pub default_title: String,
    pub default_body: String,
    /// Relative to the scope
    pub default_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "islamic-app".to_string(),
            version: "v1".to_string(),
            scope: Url::parse(DEFAULT_SCOPE).expect("default scope is a valid URL"),
            assets: NamespaceAssets::default(),
            external_prefixes: vec![
                "https://cdnjs.cloudflare.com/".to_string(),
                "https://fonts.googleapis.com/".to_string(),
                "https://fonts.gstatic.com/".to_string(),
            ],
            entry_documents: vec!["./".to_string(), "./index.html".to_string()],
            image_extensions: ["png", "jpg", "jpeg", "gif", "svg", "webp", "ico"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reminders: ReminderConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl Default for NamespaceAssets {
    fn default() -> Self {
        Self {
            core: vec![
                "./".to_string(),
                "./index.html".to_string(),
                "./manifest.json".to_string(),
            ],
            images: vec!["./icon-192.png".to_string()],
            fonts: vec![
                "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css"
                    .to_string(),
                "https://fonts.googleapis.com/css2?family=Amiri:wght@400;700&family=Cairo:wght@400;600;700&family=Tajawal:wght@400;500;700&display=swap"
                    .to_string(),
            ],
            api: Vec::new(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "push-".to_string(),
            default_title: "مواقيت الصلاة".to_string(),
            default_body: "لديك إشعار جديد".to_string(),
            default_url: "./".to_string(),
        }
    }
}

impl NamespaceAssets {
    /// Asset list of one namespace.
    pub fn for_namespace(&self, namespace: Namespace) -> &[String] {
        match namespace {
            Namespace::Core => &self.core,
            Namespace::Images => &self.images,
            Namespace::Fonts => &self.fonts,
            Namespace::Api => &self.api,
        }
    }
}

impl WorkerConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SwError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SwError::config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Builder-style scope override.
    pub fn with_scope(mut self, scope: Url) -> Self {
        self.scope = scope;
        self
    }

    /// Builder-style version override.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Reject configurations the worker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache_prefix.trim().is_empty() {
            return Err(SwError::config("cache_prefix must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(SwError::config("version must not be empty"));
        }
        if !matches!(self.scope.scheme(), "http" | "https") {
            return Err(SwError::config(format!(
                "scope must be an http(s) URL, got {}",
                self.scope
            )));
        }
        if self.reminders.tag_prefix.is_empty() {
            return Err(SwError::config("reminder tag prefix must not be empty"));
        }
        if self.push.tag_prefix.is_empty()
            || self.push.tag_prefix.starts_with(&self.reminders.tag_prefix)
            || self.reminders.tag_prefix.starts_with(&self.push.tag_prefix)
        {
            return Err(SwError::config(
                "push tag prefix must be set and distinct from the reminder tag prefix",
            ));
        }
        Ok(())
    }

    /// Versioned cache name of a namespace, e.g. `islamic-app-core-v1`.
    pub fn cache_name(&self, namespace: Namespace) -> String {
        format!("{}-{}-{}", self.cache_prefix, namespace.id(), self.version)
    }

    /// Versioned names of all four namespaces.
    pub fn cache_names(&self) -> Vec<String> {
        Namespace::ALL
            .iter()
            .map(|ns| self.cache_name(*ns))
            .collect()
    }

    /// Resolve a possibly relative URL against the scope.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.scope
            .join(url)
            .map_err(|e| SwError::InvalidRequest(format!("{url}: {e}")))
    }
}
