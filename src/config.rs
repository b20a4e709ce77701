//! Client configuration read from `boardsync.toml`.
//!
//! Layering: file -> environment -> CLI. Environment and CLI values reach
//! this module as [`Overrides`]; the binary fills those in through clap.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! api_url = "http://localhost:8000"
//! ws_url = "ws://localhost:8000"
//! request_timeout_secs = 30
//!
//! [sync]
//! ordering = "last_processed_wins"   # or "discard_stale"
//!
//! [sync.reconnect]
//! max_attempts = 0                   # 0 disables reconnection
//! initial_backoff_ms = 500
//! max_backoff_ms = 30000
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::board::reconcile::{FetchOrdering, ReconnectPolicy, ViewOptions};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "boardsync.toml";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000";

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Per-request timeout for REST calls. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            request_timeout_secs: None,
        }
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default)]
    pub ordering: FetchOrdering,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl SyncSection {
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            ordering: self.ordering,
            reconnect: self.reconnect.clone(),
        }
    }
}

/// The complete boardsync.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sync: SyncSection,
}

/// Values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse boardsync.toml")
    }

    /// Resolve and load the config file.
    ///
    /// An explicit path must exist. Otherwise `./boardsync.toml`, then the
    /// per-user file, then built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), Self::default_path()];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Per-user config location (`<config dir>/boardsync/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("boardsync").join("config.toml"))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.api_url {
            self.server.api_url = url.clone();
        }
        if let Some(url) = &overrides.ws_url {
            self.server.ws_url = url.clone();
        }
        if overrides.request_timeout_secs.is_some() {
            self.server.request_timeout_secs = overrides.request_timeout_secs;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
