//! Hit-and-Run state tracked per (site, torrent).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HR obligation status of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HrStatus {
    #[default]
    None,
    Active,
    Finished,
    Failed,
    Unknown,
}

impl HrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HrStatus::None => "NONE",
            HrStatus::Active => "ACTIVE",
            HrStatus::Finished => "FINISHED",
            HrStatus::Failed => "FAILED",
            HrStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Whether the torrent still exists on the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeStatus {
    #[default]
    Alive,
    Deleted,
}

impl LifeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeStatus::Alive => "ALIVE",
            LifeStatus::Deleted => "DELETED",
        }
    }
}

/// How a torrent that drops off the HR page should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisappearSemantics {
    /// The site removes torrents from the list once the obligation is met
    Finished,
    /// Removal is ambiguous
    #[default]
    Unknown,
}

impl DisappearSemantics {
    /// The HR status a disappeared record moves to.
    pub fn status(self) -> HrStatus {
        match self {
            DisappearSemantics::Finished => HrStatus::Finished,
            DisappearSemantics::Unknown => HrStatus::Unknown,
        }
    }
}

/// Full HR history of one torrent at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentHrRecord {
    pub site: String,
    pub torrent_id: String,

    #[serde(default)]
    pub hr_status: HrStatus,

    #[serde(default)]
    pub life_status: LifeStatus,

    /// Hours the site requires the torrent to be seeded
    #[serde(default)]
    pub required_seed_hours: Option<f64>,

    /// Hours seeded so far
    #[serde(default)]
    pub seeded_hours: f64,

    /// When the obligation must be satisfied
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub first_seen_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl TorrentHrRecord {
    /// Create an untracked record for a torrent seen for the first time.
    pub fn new(site: impl Into<String>, torrent_id: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            torrent_id: torrent_id.into(),
            hr_status: HrStatus::None,
            life_status: LifeStatus::Alive,
            required_seed_hours: None,
            seeded_hours: 0.0,
            deadline: None,
            first_seen_at: None,
            last_seen_at: None,
        }
    }

    pub fn key(&self) -> HrKey {
        HrKey::new(&self.site, &self.torrent_id)
    }

    /// Seeded/required ratio, absent when the requirement is unknown or not positive.
    pub fn progress_ratio(&self) -> Option<f64> {
        match self.required_seed_hours {
            Some(required) if required > 0.0 => Some(self.seeded_hours / required),
            _ => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life_status == LifeStatus::Alive
    }
}

/// Cache/repository key of an HR record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HrKey {
    pub site: String,
    pub torrent_id: String,
}

impl HrKey {
    pub fn new(site: &str, torrent_id: &str) -> Self {
        Self {
            site: site.to_string(),
            torrent_id: torrent_id.to_string(),
        }
    }
}

/// One row parsed from a site's HR page.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHrRow {
    pub torrent_id: String,
    pub required_seed_hours: Option<f64>,
    pub seeded_hours: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Parsed HR page.
#[derive(Debug, Clone, Default)]
pub struct ParsedHrPage {
    /// Whether an HR table was recognised at all
    pub recognized: bool,
    pub rows: Vec<ParsedHrRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_ratio_guards_denominator() {
        let mut record = TorrentHrRecord::new("s", "1");
        record.seeded_hours = 10.0;
        assert_eq!(record.progress_ratio(), None);

        record.required_seed_hours = Some(0.0);
        assert_eq!(record.progress_ratio(), None);

        record.required_seed_hours = Some(-5.0);
        assert_eq!(record.progress_ratio(), None);

        record.required_seed_hours = Some(20.0);
        assert_eq!(record.progress_ratio(), Some(0.5));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&HrStatus::Finished).unwrap();
        assert_eq!(json, "\"FINISHED\"");
        let parsed: DisappearSemantics = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(parsed.status(), HrStatus::Finished);
    }
}
