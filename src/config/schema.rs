/// Configuration schema and defaults for coverdeck.
///
/// Sections: `[backend]`, `[polling]`, `[dashboard]`, `[web]`, `[logging]`.
/// Every field has a built-in default so a config file only needs the
/// values it overrides.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level coverdeck configuration.
///
/// Maps to `~/.coverdeck/config.toml` and `.coverdeck.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverdeckConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub dashboard: DashboardConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the coverage backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// REST base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// WebSocket base URL. Empty means "derive from `base_url`".
    pub ws_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            ws_url: String::new(),
            timeout_ms: 30_000,
        }
    }
}

impl BackendConfig {
    /// Effective WebSocket base URL.
    ///
    /// `http://` becomes `ws://` and `https://` becomes `wss://` when no
    /// explicit `ws_url` is configured.
    pub fn effective_ws_url(&self) -> String {
        if !self.ws_url.trim().is_empty() {
            return self.ws_url.trim_end_matches('/').to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        }
    }
}

// ---------------------------------------------------------------------------
// [polling]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between status polls in milliseconds.
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Repository context and refresh cadence for the productivity dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub repository_id: String,
    pub repository_url: String,
    pub branch: String,
    /// Records per page.
    pub page_size: u32,
    /// Auto-refresh period in seconds while a dashboard view is mounted.
    pub refresh_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            repository_id: String::new(),
            repository_url: String::new(),
            branch: "main".to_string(),
            page_size: 20,
            refresh_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address for `coverdeck web`.
    pub addr: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file. Logs go to stderr when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl CoverdeckConfig {
    /// The annotated TOML written by `coverdeck config init`.
    pub fn default_toml() -> &'static str {
        r#"# coverdeck configuration
# Precedence: defaults < ~/.coverdeck/config.toml < .coverdeck.toml < COVERDECK_* env vars

[backend]
base_url = "http://localhost:8080"
# Leave empty to derive ws:// or wss:// from base_url.
ws_url = ""
timeout_ms = 30000

[polling]
interval_ms = 1000

[dashboard]
repository_id = ""
repository_url = ""
branch = "main"
page_size = 20
refresh_secs = 30

[web]
addr = "127.0.0.1:9747"

[logging]
level = "info"
# file = "/tmp/coverdeck.log"
"#
    }
}
