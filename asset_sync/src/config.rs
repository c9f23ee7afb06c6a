//! Runtime configuration: TOML file, environment overrides, validation.
//!
//! Every field has a default, so an empty file (or no file at all) is valid.
//!
//! ```toml
//! [source]
//! host = "127.0.0.1"
//! port = 5000
//! max_attempts = 3
//! backoff_ms = 0
//! timeout_secs = 30
//!
//! [cache]
//! root = "./market_cache"
//! file_date_format = "%Y-%m-%d"
//!
//! [sync]
//! workers = 4
//! queue_capacity = 2
//! skip_weekends = true
//! time_zone = "America/New_York"
//! ```
//!
//! Environment overrides, applied after the file: `ACTIVETICK_HOST`,
//! `ACTIVETICK_PORT`, `ASSET_SYNC_CACHE_ROOT`, `ASSET_SYNC_TIME_ZONE`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use market_data_ingestor::providers::activetick::{ActiveTickConfig, ActiveTickProvider};
use market_data_ingestor::providers::activetick::params::WIRE_TIME_FORMAT;
use market_data_ingestor::providers::retry::{Backoff, RetryPolicy};
use serde::Deserialize;
use shared_utils::config::{ConfigError, load_toml};
use shared_utils::env::env_override;

use crate::store::{DEFAULT_FILE_DATE_FORMAT, JsonStore};
use crate::sync::{SyncOptions, SyncOrchestrator};
use crate::tz::parse_tz;

/// Overrides `source.host`.
pub const ENV_HOST: &str = "ACTIVETICK_HOST";
/// Overrides `source.port`.
pub const ENV_PORT: &str = "ACTIVETICK_PORT";
/// Overrides `cache.root`.
pub const ENV_CACHE_ROOT: &str = "ASSET_SYNC_CACHE_ROOT";
/// Overrides `sync.time_zone`.
pub const ENV_TIME_ZONE: &str = "ASSET_SYNC_TIME_ZONE";

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Vendor gateway.
    pub source: SourceSection,
    /// On-disk cache.
    pub cache: CacheSection,
    /// Orchestrator tuning.
    pub sync: SyncSection,
}

/// `[source]`: where the vendor's HTTP gateway listens and how hard to retry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    /// Gateway host name or address.
    pub host: String,
    /// `0` or 84 leave the port out of the URL.
    pub port: u16,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Fixed pause between attempts; `0` retries immediately.
    pub backoff_ms: u64,
    /// Per-attempt HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_attempts: 3,
            backoff_ms: 0,
            timeout_secs: 30,
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Cache root directory.
    pub root: PathBuf,
    /// chrono layout of per-day tick file names.
    pub file_date_format: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./market_cache"),
            file_date_format: DEFAULT_FILE_DATE_FORMAT.to_string(),
        }
    }
}

/// `[sync]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    /// Concurrent tick fetches.
    pub workers: usize,
    /// Bound of the tick job queue.
    pub queue_capacity: usize,
    /// Leave Saturdays and Sundays out of gap detection.
    pub skip_weekends: bool,
    /// IANA name of the zone whose calendar days partition the cache.
    pub time_zone: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 2,
            skip_weekends: true,
            time_zone: "America/New_York".to_string(),
        }
    }
}

impl SyncConfig {
    /// Defaults, then `path` if given, then the environment; validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config: SyncConfig = match path {
            Some(path) => load_toml(path)?,
            None => SyncConfig::default(),
        };
        config.apply_overrides(env_override)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which returns a value per variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.source.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.source.port = port.parse().map_err(|e| ConfigError::Invalid {
                key: ENV_PORT.to_string(),
                message: format!("{port:?} is not a port: {e}"),
            })?;
        }
        if let Some(root) = lookup(ENV_CACHE_ROOT) {
            self.cache.root = PathBuf::from(root);
        }
        if let Some(tz) = lookup(ENV_TIME_ZONE) {
            self.sync.time_zone = tz;
        }
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.source.host.trim().is_empty() {
            return Err(invalid("source.host", "must not be empty"));
        }
        if self.source.max_attempts == 0 {
            return Err(invalid("source.max_attempts", "must be at least 1"));
        }
        if self.sync.workers == 0 {
            return Err(invalid("sync.workers", "must be at least 1"));
        }
        if self.sync.queue_capacity == 0 {
            return Err(invalid("sync.queue_capacity", "must be at least 1"));
        }
        if self.cache.file_date_format.trim().is_empty() {
            return Err(invalid("cache.file_date_format", "must not be empty"));
        }
        self.time_zone()?;
        Ok(())
    }

    /// Parsed `sync.time_zone`.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        parse_tz(&self.sync.time_zone).map_err(|e| ConfigError::Invalid {
            key: "sync.time_zone".to_string(),
            message: e.to_string(),
        })
    }

    /// Client settings for the ActiveTick gateway.
    pub fn activetick(&self) -> ActiveTickConfig {
        let backoff = match self.source.backoff_ms {
            0 => Backoff::None,
            ms => Backoff::Fixed(Duration::from_millis(ms)),
        };
        ActiveTickConfig {
            host: self.source.host.clone(),
            port: self.source.port,
            retry: RetryPolicy::new(self.source.max_attempts, backoff),
            timeout: Duration::from_secs(self.source.timeout_secs),
            time_format: WIRE_TIME_FORMAT.to_string(),
        }
    }

    /// Cache described by `[cache]`.
    pub fn store(&self) -> JsonStore {
        JsonStore::new(&self.cache.root).with_file_date_format(&self.cache.file_date_format)
    }

    /// Orchestrator tuning with the zone parsed.
    pub fn sync_options(&self) -> Result<SyncOptions, ConfigError> {
        Ok(SyncOptions {
            workers: self.sync.workers,
            queue_capacity: self.sync.queue_capacity,
            skip_weekends: self.sync.skip_weekends,
            time_zone: self.time_zone()?,
        })
    }

    /// Orchestrator wired to the ActiveTick HTTP gateway.
    pub fn build_orchestrator(&self) -> anyhow::Result<SyncOrchestrator> {
        let provider = ActiveTickProvider::new(self.activetick())?;
        Ok(SyncOrchestrator::new(
            Arc::new(provider),
            self.store(),
            self.sync_options()?,
        ))
    }
}
