//! Configuration loading for catalog2latest.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/catalog2latest/config.toml`.

use chrono::{DateTime, Utc};
use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::LatestError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Service index the catalog and registration resources are discovered from
    #[serde(default = "default_service_index_url")]
    pub service_index_url: String,

    /// Root directory of the blob store
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Container holding the cursor and all projection documents
    #[serde(default = "default_container")]
    pub container: String,

    /// Cursor used when none has been persisted yet
    #[serde(default = "default_min_cursor")]
    pub default_min_cursor: DateTime<Utc>,

    /// Pause between passes
    #[serde(default = "default_sleep_duration_secs")]
    pub sleep_duration_secs: u64,

    /// Cap on catalog pages read per pass (unbounded when unset)
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Concurrent catalog page fetches
    #[serde(default = "default_workers")]
    pub producer_workers: usize,

    /// Concurrent package metadata workers
    #[serde(default = "default_workers")]
    pub consumer_workers: usize,

    /// Capacity of the identifier channel between producer and workers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Delay before the first retry of a failed package
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on the retry delay; equal to `retry_delay_secs` for a fixed delay
    #[serde(default = "default_retry_delay_secs")]
    pub retry_max_delay_secs: u64,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_service_index_url() -> String {
    "https://api.nuget.org/v3/index.json".to_string()
}

fn default_storage_path() -> String {
    ProjectDirs::from("", "", "catalog2latest")
        .map(|p| p.data_local_dir().join("blobs"))
        .unwrap_or_else(|| PathBuf::from("./blobs"))
        .to_string_lossy()
        .to_string()
}

fn default_container() -> String {
    "latest".to_string()
}

fn default_min_cursor() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(DEFAULT_MIN_CURSOR)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

const DEFAULT_MIN_CURSOR: &str = "1900-01-01T00:00:00Z";

fn default_sleep_duration_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    32
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_http_timeout_secs() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_index_url: default_service_index_url(),
            storage_path: default_storage_path(),
            container: default_container(),
            default_min_cursor: default_min_cursor(),
            sleep_duration_secs: default_sleep_duration_secs(),
            max_pages: None,
            producer_workers: default_workers(),
            consumer_workers: default_workers(),
            channel_capacity: default_channel_capacity(),
            retry_delay_secs: default_retry_delay_secs(),
            retry_max_delay_secs: default_retry_delay_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (`<config dir>/catalog2latest/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`CATALOG2LATEST_*`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, LatestError> {
        let config_dir = ProjectDirs::from("", "", "catalog2latest")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("service_index_url", default_service_index_url())
            .map_err(|e| LatestError::Config(e.to_string()))?
            .set_default("storage_path", default_storage_path())
            .map_err(|e| LatestError::Config(e.to_string()))?
            .set_default("container", default_container())
            .map_err(|e| LatestError::Config(e.to_string()))?
            .set_default("default_min_cursor", DEFAULT_MIN_CURSOR)
            .map_err(|e| LatestError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| LatestError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CATALOG2LATEST_CONSUMER_WORKERS, CATALOG2LATEST_MAX_PAGES, etc.
        builder = builder.add_source(
            Environment::with_prefix("CATALOG2LATEST")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| LatestError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| LatestError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the job cannot run with.
    pub fn validate(&self) -> Result<(), LatestError> {
        if !self.service_index_url.starts_with("http://")
            && !self.service_index_url.starts_with("https://")
        {
            return Err(LatestError::Config(format!(
                "service_index_url must be an http(s) URL, got '{}'",
                self.service_index_url
            )));
        }
        if self.container.is_empty() {
            return Err(LatestError::Config("container must not be empty".to_string()));
        }
        if self.producer_workers == 0 {
            return Err(LatestError::Config("producer_workers must be > 0".to_string()));
        }
        if self.consumer_workers == 0 {
            return Err(LatestError::Config("consumer_workers must be > 0".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(LatestError::Config("channel_capacity must be > 0".to_string()));
        }
        if self.max_pages == Some(0) {
            return Err(LatestError::Config("max_pages must be > 0 when set".to_string()));
        }
        if self.retry_max_delay_secs < self.retry_delay_secs {
            return Err(LatestError::Config(format!(
                "retry_max_delay_secs ({}) must be >= retry_delay_secs ({})",
                self.retry_max_delay_secs, self.retry_delay_secs
            )));
        }
        Ok(())
    }

    /// Pause between passes.
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs(self.sleep_duration_secs)
    }

    /// HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Expand `~` in storage_path to the home directory
    pub fn expanded_storage_path(&self) -> PathBuf {
        if let Some(rest) = self.storage_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.storage_path)
    }
}
