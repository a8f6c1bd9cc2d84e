//! Site throttle profile and scan budgets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAFE_SCAN_MINUTES: u32 = 10;
pub const DEFAULT_SAFE_PAGES_PER_HOUR: u32 = 200;

/// Learned throttle state of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteThrottleProfile {
    pub site: String,

    #[serde(default)]
    pub last_block_start: Option<DateTime<Utc>>,

    /// End of the current/last block window; `None` means never blocked
    #[serde(default)]
    pub last_block_end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_block_cause: Option<String>,

    #[serde(default)]
    pub last_full_scan_minutes: Option<u32>,

    #[serde(default)]
    pub last_full_scan_pages: Option<u32>,

    pub safe_scan_minutes: u32,
    pub safe_pages_per_hour: u32,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SiteThrottleProfile {
    pub fn new(site: impl Into<String>) -> Self {
        Self::with_defaults(site, DEFAULT_SAFE_SCAN_MINUTES, DEFAULT_SAFE_PAGES_PER_HOUR)
    }

    pub fn with_defaults(
        site: impl Into<String>,
        safe_scan_minutes: u32,
        safe_pages_per_hour: u32,
    ) -> Self {
        Self {
            site: site.into(),
            last_block_start: None,
            last_block_end: None,
            last_block_cause: None,
            last_full_scan_minutes: None,
            last_full_scan_pages: None,
            safe_scan_minutes,
            safe_pages_per_hour,
            updated_at: None,
        }
    }

    /// Whether `now` falls inside the block window.
    pub fn in_block_window(&self, now: DateTime<Utc>) -> bool {
        self.last_block_end.is_some_and(|end| now < end)
    }
}

/// Allowance a crawl may consume before the next guard check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanBudget {
    pub blocked: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,

    pub max_minutes: u32,
    pub max_pages: u32,
}

impl ScanBudget {
    pub fn blocked(reason: Option<String>, until: Option<DateTime<Utc>>) -> Self {
        Self {
            blocked: true,
            reason,
            until,
            max_minutes: 0,
            max_pages: 0,
        }
    }

    pub fn allowed(max_minutes: u32, max_pages: u32) -> Self {
        Self {
            blocked: false,
            reason: None,
            until: None,
            max_minutes,
            max_pages,
        }
    }
}

/// Append-only log entry for an observed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteGuardEvent {
    pub id: u64,
    pub site: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub block_until: DateTime<Utc>,
    pub cause: String,

    #[serde(default)]
    pub scan_minutes_before_block: Option<u32>,

    #[serde(default)]
    pub scan_pages_before_block: Option<u32>,
}

/// Block event as handed to the repository before it is assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockEvent {
    pub site: String,
    pub block_until: DateTime<Utc>,
    pub cause: String,
    pub scan_minutes_before_block: Option<u32>,
    pub scan_pages_before_block: Option<u32>,
    pub created_at: DateTime<Utc>,
}
