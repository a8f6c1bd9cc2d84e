//! Engine configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::action::ActionLevel;

/// Root engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine-wide concurrency settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// HR risk evaluation settings
    #[serde(default)]
    pub hr_policy: HrPolicyConfig,

    /// Inbox event severity settings
    #[serde(default)]
    pub inbox_policy: InboxPolicyConfig,

    /// Catalogue crawl settings
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Settings for the bundled HTTP client
    #[serde(default)]
    pub http: HttpConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Read `config.toml`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing or broken file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent_sites == 0 {
            return Err(AppError::validation(
                "engine.max_concurrent_sites must be > 0",
            ));
        }
        let threshold = self.hr_policy.risk_threshold_hours;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(AppError::validation(
                "hr_policy.risk_threshold_hours must be >= 0",
            ));
        }
        if self.inbox_policy.throttle_default_hours == 0 {
            return Err(AppError::validation(
                "inbox_policy.throttle_default_hours must be > 0",
            ));
        }
        if self.indexer.pages_per_batch == 0 {
            return Err(AppError::validation("indexer.pages_per_batch must be > 0"));
        }
        if self.indexer.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "indexer.max_consecutive_failures must be > 0",
            ));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sites refreshed in parallel by the multi-site pipeline
    #[serde(default = "defaults::max_concurrent_sites")]
    pub max_concurrent_sites: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sites: defaults::max_concurrent_sites(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrPolicyConfig {
    /// Remaining hours at or below which an active HR is reported at risk
    #[serde(default = "defaults::risk_threshold_hours")]
    pub risk_threshold_hours: f64,
}

impl Default for HrPolicyConfig {
    fn default() -> Self {
        Self {
            risk_threshold_hours: defaults::risk_threshold_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxPolicyConfig {
    #[serde(default = "defaults::penalty_level")]
    pub penalty_level: ActionLevel,

    #[serde(default = "defaults::delete_level")]
    pub delete_level: ActionLevel,

    /// Block length assumed when a throttle notice carries no deadline
    #[serde(default = "defaults::throttle_default_hours")]
    pub throttle_default_hours: u32,
}

impl Default for InboxPolicyConfig {
    fn default() -> Self {
        Self {
            penalty_level: defaults::penalty_level(),
            delete_level: defaults::delete_level(),
            throttle_default_hours: defaults::throttle_default_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "defaults::full_max_pages")]
    pub full_max_pages: u32,

    /// Pages between two Site Guard checks during a full sync
    #[serde(default = "defaults::pages_per_batch")]
    pub pages_per_batch: u32,

    #[serde(default = "defaults::incremental_max_pages")]
    pub incremental_max_pages: u32,

    #[serde(default = "defaults::full_page_delay_ms")]
    pub full_page_delay_ms: u64,

    #[serde(default = "defaults::incremental_page_delay_ms")]
    pub incremental_page_delay_ms: u64,

    /// A non-first page with fewer rows is treated as the last page
    #[serde(default = "defaults::min_rows_per_page")]
    pub min_rows_per_page: usize,

    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl IndexerConfig {
    pub fn full_page_delay(&self) -> Duration {
        Duration::from_millis(self.full_page_delay_ms)
    }

    pub fn incremental_page_delay(&self) -> Duration {
        Duration::from_millis(self.incremental_page_delay_ms)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            full_max_pages: defaults::full_max_pages(),
            pages_per_batch: defaults::pages_per_batch(),
            incremental_max_pages: defaults::incremental_max_pages(),
            full_page_delay_ms: defaults::full_page_delay_ms(),
            incremental_page_delay_ms: defaults::incremental_page_delay_ms(),
            min_rows_per_page: defaults::min_rows_per_page(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Sent by the bundled reqwest client
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one site profile per TOML file
    #[serde(default = "defaults::sites_dir")]
    pub sites_dir: PathBuf,

    /// Root of the JSON repositories
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sites_dir: defaults::sites_dir(),
            storage_dir: defaults::storage_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::models::action::ActionLevel;

    pub fn max_concurrent_sites() -> usize {
        4
    }
    pub fn risk_threshold_hours() -> f64 {
        1.0
    }
    pub fn penalty_level() -> ActionLevel {
        ActionLevel::Error
    }
    pub fn delete_level() -> ActionLevel {
        ActionLevel::Warning
    }
    pub fn throttle_default_hours() -> u32 {
        12
    }

    // Indexer defaults
    pub fn full_max_pages() -> u32 {
        100
    }
    pub fn pages_per_batch() -> u32 {
        10
    }
    pub fn incremental_max_pages() -> u32 {
        5
    }
    pub fn full_page_delay_ms() -> u64 {
        1000
    }
    pub fn incremental_page_delay_ms() -> u64 {
        500
    }
    pub fn min_rows_per_page() -> usize {
        20
    }
    pub fn max_consecutive_failures() -> u32 {
        3
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pt-intel/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn sites_dir() -> PathBuf {
        PathBuf::from("data/intel_sites")
    }
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn log_level() -> String {
        "info".into()
    }
}
