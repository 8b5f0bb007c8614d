use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Bounded retry for non-success HTTP statuses (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of negotiation attempts (including the first) before the job is abandoned.
    pub max_attempts: u32,
    /// Countdown in seconds shown before each retry.
    pub countdown_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            countdown_secs: 5,
        }
    }
}

/// Per-request timeout and its escalation after connectivity loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout in seconds for a request when nothing has gone wrong yet.
    pub base_secs: u64,
    /// Added to the timeout after every connectivity loss.
    pub step_secs: u64,
    /// Ceiling for the escalated timeout.
    pub max_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_secs: 10,
            step_secs: 10,
            max_secs: 60,
        }
    }
}

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL hit with a HEAD request to decide whether the network is up.
    pub probe_url: String,
    pub probe_timeout_secs: u64,
    /// Delay between probes while offline (when the offline policy keeps waiting).
    pub poll_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: "http://google.com/generate_204".to_string(),
            probe_timeout_secs: 4,
            poll_interval_secs: 5,
        }
    }
}

/// Engine configuration loaded from `~/.config/mdl/config.toml`.
///
/// Passed to each `Downloader` at construction, so jobs with different
/// policies can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base read/write chunk size in bytes.
    pub chunk_size: usize,
    /// Minimum window in milliseconds over which throughput is averaged.
    pub rate_window_ms: u64,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub connectivity: ConnectivityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            rate_window_ms: 1000,
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            connectivity: ConnectivityConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.poll_interval_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
