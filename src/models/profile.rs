//! Per-site intelligence profile, loaded from one TOML file per site.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::guard::{DEFAULT_SAFE_PAGES_PER_HOUR, DEFAULT_SAFE_SCAN_MINUTES};
use crate::models::hr::DisappearSemantics;

/// Keyword category checked first; a match classifies the message as an HR penalty.
pub const KEYWORD_PENALTY: &str = "penalty";
/// Keyword category for remote torrent deletion notices.
pub const KEYWORD_DELETE: &str = "delete";
/// Keyword category for throttle/ban notices.
pub const KEYWORD_THROTTLE: &str = "throttle";

/// Read-only configuration of one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelSiteProfile {
    /// Site key (e.g., "hdsky")
    pub site: String,

    /// Base URL relative page paths are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub hr: HrConfig,

    #[serde(default)]
    pub inbox: InboxConfig,

    #[serde(default)]
    pub site_guard: SiteGuardConfig,

    #[serde(default)]
    pub indexer: IndexerSiteConfig,
}

impl IntelSiteProfile {
    /// Profile with every feature at its default (HR and inbox off, guard on).
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            base_url: None,
            hr: HrConfig::default(),
            inbox: InboxConfig::default(),
            site_guard: SiteGuardConfig::default(),
            indexer: IndexerSiteConfig::default(),
        }
    }

    /// Parse a profile from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let profile: Self = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site.trim().is_empty() {
            return Err(AppError::validation("site profile is missing 'site'"));
        }
        if self.site_guard.default_safe_scan_minutes == 0 {
            return Err(AppError::validation(format!(
                "{}: site_guard.default_safe_scan_minutes must be > 0",
                self.site
            )));
        }
        for pattern in &self.inbox.torrent_id_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                AppError::validation(format!(
                    "{}: invalid inbox.torrent_id_patterns entry '{}': {}",
                    self.site, pattern, e
                ))
            })?;
        }
        Ok(())
    }
}

/// HR tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Informational listing mode (e.g., "TASK_LIST")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Meaning of a torrent falling off the HR page
    #[serde(default)]
    pub disappear_semantics: DisappearSemantics,

    /// HR page path relative to the site's base URL
    #[serde(default = "defaults::hr_page_path", alias = "hr_page_path")]
    pub page_path: String,
}

impl Default for HrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: None,
            disappear_semantics: DisappearSemantics::default(),
            page_path: defaults::hr_page_path(),
        }
    }
}

/// Private-message monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Explicit parser name; falls back to the site key, then the generic parser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,

    /// Inbox page path relative to the site's base URL
    #[serde(default = "defaults::inbox_page_path", alias = "inbox_page_path")]
    pub page_path: String,

    /// Category ("penalty", "delete", "throttle") to keyword list
    #[serde(default, alias = "keyword_dictionary")]
    pub pm_keywords: HashMap<String, Vec<String>>,

    /// Regexes whose first capture group is a torrent id
    #[serde(default = "defaults::torrent_id_patterns")]
    pub torrent_id_patterns: Vec<String>,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            parser: None,
            page_path: defaults::inbox_page_path(),
            pm_keywords: HashMap::new(),
            torrent_id_patterns: defaults::torrent_id_patterns(),
        }
    }
}

/// Throttle protection defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteGuardConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::safe_scan_minutes")]
    pub default_safe_scan_minutes: u32,

    #[serde(default = "defaults::safe_pages_per_hour")]
    pub default_safe_pages_per_hour: u32,
}

impl Default for SiteGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_safe_scan_minutes: DEFAULT_SAFE_SCAN_MINUTES,
            default_safe_pages_per_hour: DEFAULT_SAFE_PAGES_PER_HOUR,
        }
    }
}

/// Catalogue listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSiteConfig {
    /// Listing page path; `?page=N` is appended
    #[serde(default = "defaults::list_path")]
    pub list_path: String,
}

impl Default for IndexerSiteConfig {
    fn default() -> Self {
        Self {
            list_path: defaults::list_path(),
        }
    }
}

impl IndexerSiteConfig {
    /// Path of listing page `page`.
    pub fn page_path(&self, page: u32) -> String {
        let separator = if self.list_path.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.list_path, separator, page)
    }
}

mod defaults {
    use crate::models::guard::{DEFAULT_SAFE_PAGES_PER_HOUR, DEFAULT_SAFE_SCAN_MINUTES};

    pub fn enabled() -> bool {
        true
    }
    pub fn hr_page_path() -> String {
        "hr.php".into()
    }
    pub fn inbox_page_path() -> String {
        "messages.php".into()
    }
    pub fn list_path() -> String {
        "browse.php".into()
    }
    pub fn safe_scan_minutes() -> u32 {
        DEFAULT_SAFE_SCAN_MINUTES
    }
    pub fn safe_pages_per_hour() -> u32 {
        DEFAULT_SAFE_PAGES_PER_HOUR
    }
    pub fn torrent_id_patterns() -> Vec<String> {
        vec![
            r"[?&](?:id|torrentid|tid)=(\d+)".into(),
            r"(?i)torrent\s*(?:id)?\s*[#:：]?\s*(\d+)".into(),
            r"种子\s*(?:ID|id)?\s*[#:：]?\s*(\d+)".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_profile() {
        let profile = IntelSiteProfile::from_toml(
            r#"
site = "hdsky"
base_url = "https://hdsky.me/"

[hr]
enabled = true
disappear_semantics = "FINISHED"
hr_page_path = "hr_list.php"

[inbox]
enabled = true
parser = "ttg"

[inbox.keyword_dictionary]
penalty = ["H&R"]
delete = ["删除"]

[site_guard]
default_safe_scan_minutes = 5
"#,
        )
        .unwrap();

        assert_eq!(profile.hr.disappear_semantics, DisappearSemantics::Finished);
        assert_eq!(profile.hr.page_path, "hr_list.php");
        assert_eq!(profile.inbox.page_path, "messages.php");
        assert_eq!(profile.inbox.pm_keywords[KEYWORD_DELETE], vec!["删除"]);
        assert!(!profile.inbox.torrent_id_patterns.is_empty());
        assert_eq!(profile.site_guard.default_safe_scan_minutes, 5);
        assert_eq!(profile.site_guard.default_safe_pages_per_hour, 200);
        assert!(profile.site_guard.enabled);
    }

    #[test]
    fn test_defaults_for_minimal_profile() {
        let profile = IntelSiteProfile::from_toml("site = \"x\"").unwrap();
        assert!(!profile.hr.enabled);
        assert_eq!(profile.hr.disappear_semantics, DisappearSemantics::Unknown);
        assert_eq!(profile.hr.page_path, "hr.php");
        assert_eq!(profile.indexer.page_path(3), "browse.php?page=3");
    }

    #[test]
    fn test_missing_site_rejected() {
        assert!(IntelSiteProfile::from_toml("site = \"  \"").is_err());
        assert!(IntelSiteProfile::from_toml("[hr]\nenabled = true").is_err());
    }

    #[test]
    fn test_list_path_with_query() {
        let config = IndexerSiteConfig {
            list_path: "torrents.php?cat=401".into(),
        };
        assert_eq!(config.page_path(2), "torrents.php?cat=401&page=2");
    }
}
