//! Actions: the engine's only output type.
//!
//! Actions are value objects. Builders consume and return `Self`, so an
//! action handed out by a policy is never changed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    HrMarkSafe,
    HrMarkRisk,
    HrRecordProgress,
    TorrentDeletedRemote,
    TorrentHrPenalty,
    SiteThrottled,
    SiteRecovered,
    UserNotification,
    LogOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,

    pub site: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub level: ActionLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Action {
    pub fn new(action_type: ActionType, site: impl Into<String>) -> Self {
        Self {
            action_type,
            site: site.into(),
            torrent_id: None,
            title: None,
            message: None,
            level: ActionLevel::Info,
            payload: None,
            created_at: None,
        }
    }

    pub fn with_torrent(mut self, torrent_id: impl Into<String>) -> Self {
        self.torrent_id = Some(torrent_id.into());
        self
    }

    pub fn with_optional_torrent(mut self, torrent_id: Option<String>) -> Self {
        self.torrent_id = torrent_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_level(mut self, level: ActionLevel) -> Self {
        self.level = level;
        self
    }

    /// Add one payload entry, creating the payload map if needed.
    pub fn with_payload(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Read a payload entry.
    pub fn payload_value(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }
}
