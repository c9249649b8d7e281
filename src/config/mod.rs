/// Configuration system for coverdeck.
///
/// Layered hierarchy, later layers win at the key level:
///
/// 1. **Built-in defaults**: [`schema::CoverdeckConfig::default()`]
/// 2. **User global config**: `~/.coverdeck/config.toml`
/// 3. **Project local config**: `.coverdeck.toml` in the working directory
/// 4. **Environment variables**: `COVERDECK_*`
///
/// TOML layers are merged as value trees before deserialization, so a
/// project file that only sets `[dashboard] branch` keeps the global
/// file's `[backend]` settings.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{
    BackendConfig, CoverdeckConfig, DashboardConfig, LoggingConfig, PollingConfig, WebConfig,
};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
pub fn load() -> CoverdeckConfig {
    let layers = [global_config_path(), project_config_path()];
    let mut config = load_layers(layers.iter().flatten().map(PathBuf::as_path));
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Merge the given TOML files (missing or malformed ones are skipped) on
/// top of the built-in defaults.
pub fn load_layers<'a>(paths: impl IntoIterator<Item = &'a Path>) -> CoverdeckConfig {
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for path in paths {
        let Some(layer) = read_toml_value(path) else {
            continue;
        };
        merge_values(&mut merged, layer);
    }
    merged.try_into().unwrap_or_else(|err| {
        tracing::warn!("ignoring config files that do not match the schema: {err}");
        CoverdeckConfig::default()
    })
}

fn read_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("skipping malformed config {}: {err}", path.display());
            None
        }
    }
}

/// Recursively overlay `overlay` onto `base`. Tables merge; anything else
/// replaces.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".coverdeck").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".coverdeck.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply `COVERDECK_*` overrides.
///
/// The lookup is injected so tests don't have to mutate the process
/// environment.
///
/// - `COVERDECK_BASE_URL`, `COVERDECK_WS_URL`, `COVERDECK_TIMEOUT_MS`
/// - `COVERDECK_POLL_INTERVAL_MS`
/// - `COVERDECK_REPOSITORY_ID`, `COVERDECK_REPOSITORY_URL`, `COVERDECK_BRANCH`
/// - `COVERDECK_LOG`
pub fn apply_env_overrides(config: &mut CoverdeckConfig, var: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(val) = non_empty("COVERDECK_BASE_URL") {
        config.backend.base_url = val;
    }
    if let Some(val) = non_empty("COVERDECK_WS_URL") {
        config.backend.ws_url = val;
    }
    if let Some(ms) = non_empty("COVERDECK_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.backend.timeout_ms = ms;
    }
    if let Some(ms) = non_empty("COVERDECK_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.polling.interval_ms = ms;
    }
    if let Some(val) = non_empty("COVERDECK_REPOSITORY_ID") {
        config.dashboard.repository_id = val;
    }
    if let Some(val) = non_empty("COVERDECK_REPOSITORY_URL") {
        config.dashboard.repository_url = val;
    }
    if let Some(val) = non_empty("COVERDECK_BRANCH") {
        config.dashboard.branch = val;
    }
    if let Some(val) = non_empty("COVERDECK_LOG") {
        config.logging.level = val;
    }
}

// ---------------------------------------------------------------------------
// Config init / show
// ---------------------------------------------------------------------------

/// Write the annotated default config to `~/.coverdeck/config.toml`.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    write_default_config(&path, force)?;
    Ok(path)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, CoverdeckConfig::default_toml()).context("failed to write config file")
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    toml::to_string_pretty(&load()).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
