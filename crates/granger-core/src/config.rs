//! User configuration loaded from `~/.config/granger/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::downloader::DownloadOptions;
use crate::http::CurlOptions;
use crate::sink::{CompletionMode, QueueOptions, SinkKind};

/// libcurl transfer settings (optional `[curl]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlConfig {
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Hard per-request limit; 0 disables it.
    pub timeout_secs: u64,
    /// Receive rate cap in bytes per second (None = no cap).
    pub max_bytes_per_sec: Option<u64>,
    /// libcurl receive buffer size in bytes (None = library default).
    pub buffer_bytes: Option<usize>,
    /// Body chunks buffered between a transfer and its reader.
    pub body_queue_depth: usize,
}

impl Default for CurlConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
            max_bytes_per_sec: None,
            buffer_bytes: None,
            body_queue_depth: 16,
        }
    }
}

/// Global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrangerConfig {
    /// Fragments fetched at once.
    pub concurrency: usize,
    /// Bytes per fragment; 0 = whole resource in one fragment.
    pub fragment_size: u64,
    /// Fall back to one fragment when the server does not advertise ranges.
    #[serde(default = "default_true")]
    pub single_fragment_without_ranges: bool,
    /// "stream", "file" (default) or "queued".
    #[serde(default)]
    pub sink: SinkKind,
    /// Largest write request of the queued sink, in bytes.
    #[serde(default = "default_write_page_size")]
    pub write_page_size: usize,
    /// Write requests buffered ahead of the queued sink's writer thread.
    #[serde(default = "default_write_queue_depth")]
    pub write_queue_depth: usize,
    /// "await_each" (default) or "deferred": when queued writes are checked.
    #[serde(default)]
    pub write_completion: CompletionMode,
    #[serde(default)]
    pub curl: Option<CurlConfig>,
}

fn default_true() -> bool {
    true
}

fn default_write_page_size() -> usize {
    1024 * 1024
}

fn default_write_queue_depth() -> usize {
    5
}

impl Default for GrangerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            fragment_size: 20 * 1024 * 1024,
            single_fragment_without_ranges: true,
            sink: SinkKind::default(),
            write_page_size: default_write_page_size(),
            write_queue_depth: default_write_queue_depth(),
            write_completion: CompletionMode::default(),
            curl: None,
        }
    }
}

impl GrangerConfig {
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            concurrency: self.concurrency,
            fragment_size: self.fragment_size,
            single_fragment_without_ranges: self.single_fragment_without_ranges,
        }
    }

    pub fn curl_options(&self) -> CurlOptions {
        let c = self.curl.clone().unwrap_or_default();
        CurlOptions {
            connect_timeout: Duration::from_secs(c.connect_timeout_secs),
            low_speed_limit: c.low_speed_limit,
            low_speed_time: Duration::from_secs(c.low_speed_time_secs),
            timeout: (c.timeout_secs > 0).then(|| Duration::from_secs(c.timeout_secs)),
            max_recv_speed: c.max_bytes_per_sec,
            buffer_size: c.buffer_bytes,
            body_queue_depth: c.body_queue_depth,
        }
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            page_size: self.write_page_size,
            queue_depth: self.write_queue_depth,
            mode: self.write_completion,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("granger")?;
    xdg_dirs
        .place_config_file("config.toml")
        .context("failed to create config directory")
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GrangerConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GrangerConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)
            .with_context(|| format!("failed to write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<GrangerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: GrangerConfig = toml::from_str(&data)
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
