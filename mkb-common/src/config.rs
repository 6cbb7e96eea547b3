//! Configuration loading and config file resolution
//!
//! The builder reads a single TOML file. Every field has a built-in default,
//! so an absent file (or an absent table inside it) yields a working
//! configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MKB_CONFIG";

/// Upper bound of the render coalescing window
pub const MAX_RENDER_DEBOUNCE_MS: u64 = 300;

/// Complete builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Capacity of the broadcast event bus
    pub event_bus_capacity: usize,
    pub wordpress: WordPressConfig,
    pub render: RenderConfig,
    pub autosave: AutosaveConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: 256,
            wordpress: WordPressConfig::default(),
            render: RenderConfig::default(),
            autosave: AutosaveConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// WordPress admin-ajax endpoint and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordPressConfig {
    /// Full URL of `wp-admin/admin-ajax.php`
    pub ajax_url: String,
    /// Nonce issued to the editor page
    pub nonce: String,
    pub post_id: u64,
    pub timeout_ms: u64,
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            ajax_url: String::new(),
            nonce: String::new(),
            post_id: 0,
            timeout_ms: 15_000,
        }
    }
}

impl WordPressConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Preview rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// `id` of the preview root element
    pub container_id: String,
    /// Coalescing window for state-change notifications
    pub debounce_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            container_id: "media-kit-preview".to_string(),
            debounce_ms: 50,
        }
    }
}

impl RenderConfig {
    /// Debounce window, clamped to `0..=300` ms
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.min(MAX_RENDER_DEBOUNCE_MS))
    }
}

/// Automatic saving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    /// Save after this long without further changes
    pub quiet_period_ms: u64,
    /// Force a save when changes keep arriving for this long
    pub max_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quiet_period_ms: 1_000,
            max_interval_ms: 10_000,
            retry_attempts: 3,
            retry_delay_ms: 2_000,
        }
    }
}

impl AutosaveConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.quiet_period_ms))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Undo/redo history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 50 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive covering both builder crates
    pub fn filter_directive(&self) -> String {
        format!("mkb_builder={0},mkb_common={0}", self.level)
    }
}

impl BuilderConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BuilderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file that must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Resolve the config file and load it, following priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `MKB_CONFIG` environment variable
    /// 3. `<user config dir>/mkb/config.toml`
    /// 4. Built-in defaults (fallback)
    ///
    /// A missing file degrades to defaults with a warning; a malformed file
    /// is an error.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                warn!("Config file {:?} not found, using built-in defaults", path);
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be at least 1".to_string()));
        }
        if self.history.max_entries == 0 {
            return Err(Error::Config("history.max_entries must be at least 1".to_string()));
        }
        if self.render.debounce_ms > MAX_RENDER_DEBOUNCE_MS {
            warn!(
                "render.debounce_ms {} exceeds {}ms, clamping",
                self.render.debounce_ms, MAX_RENDER_DEBOUNCE_MS
            );
        }
        Ok(())
    }
}

/// Pick the config file path without reading it
///
/// Explicit sources (CLI, environment) are returned even when the file is
/// missing so the caller can warn about it; the per-user default is only
/// returned when it exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config file
    default_config_path().filter(|p| p.exists())
}

/// `<user config dir>/mkb/config.toml` for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mkb").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuilderConfig::default();
        assert_eq!(config.event_bus_capacity, 256);
        assert_eq!(config.render.container_id, "media-kit-preview");
        assert_eq!(config.render.debounce(), Duration::from_millis(50));
        assert_eq!(config.autosave.quiet_period(), Duration::from_secs(1));
        assert_eq!(config.autosave.retry_attempts, 3);
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.wordpress.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BuilderConfig::from_toml_str(
            r#"
            [wordpress]
            ajax_url = "https://example.com/wp-admin/admin-ajax.php"
            post_id = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.wordpress.post_id, 42);
        assert_eq!(config.wordpress.timeout_ms, 15_000);
        assert!(config.autosave.enabled);
    }

    #[test]
    fn test_debounce_is_clamped() {
        let config = BuilderConfig::from_toml_str("[render]\ndebounce_ms = 5000\n").unwrap();
        assert_eq!(config.render.debounce(), Duration::from_millis(MAX_RENDER_DEBOUNCE_MS));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BuilderConfig::from_toml_str("event_bus_capacity = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(matches!(
            BuilderConfig::from_toml_str("[render\ndebounce_ms ="),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_max_interval_never_below_quiet_period() {
        let autosave = AutosaveConfig {
            quiet_period_ms: 5_000,
            max_interval_ms: 1_000,
            ..AutosaveConfig::default()
        };
        assert_eq!(autosave.max_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_filter_directive() {
        let logging = LoggingConfig { level: "debug".into() };
        assert_eq!(logging.filter_directive(), "mkb_builder=debug,mkb_common=debug");
    }
}
