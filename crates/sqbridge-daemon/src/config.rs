//! Daemon configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sqbridge_core::transport::DEFAULT_CONSOLE_PORT;
use tracing::info;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// HTTP listener settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Console connection settings
    #[serde(default)]
    pub console: ConsoleConfig,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Console connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Console IP or hostname; a value saved through the API takes precedence
    pub host: Option<String>,
    /// Control protocol port
    #[serde(default = "default_console_port")]
    pub port: u16,
    /// Connect and write deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Keep commands in memory instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

impl ConsoleConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_console_port(),
            timeout_ms: default_timeout_ms(),
            dry_run: false,
        }
    }
}

fn default_console_port() -> u16 {
    DEFAULT_CONSOLE_PORT
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Database path (optional, uses default if not set)
    pub path: Option<PathBuf>,
}

impl Config {
    /// Apply `SQ_IP`, `SQ_PORT`, and `PORT` overrides.
    ///
    /// # Errors
    /// Returns an error if a port variable is not a valid port number.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var("SQ_IP").map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
            self.console.host = Some(host);
        }
        if let Some(port) = var("SQ_PORT") {
            self.console.port =
                port.trim().parse().with_context(|| format!("Invalid SQ_PORT: {port:?}"))?;
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port.trim().parse().with_context(|| format!("Invalid PORT: {port:?}"))?;
            self.http.bind.set_port(port);
        }
        Ok(())
    }

    /// Reject settings the daemon cannot run with.
    ///
    /// # Errors
    /// Returns an error if the console timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.console.timeout_ms == 0 {
            bail!("console.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

/// Load configuration from file or defaults, then apply environment overrides.
pub fn load_config() -> Result<Config> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file, falling back to defaults if it is missing.
pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        config.validate().with_context(|| format!("Invalid config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "sqbridge", "sqbridge")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
