//! Inbox messages, classified events and the polling cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an inbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboxEventType {
    HrPenalty,
    TorrentDeleted,
    SiteThrottled,
    Other,
}

/// A message as parsed from the inbox page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub message_id: String,
    pub subject: String,
    pub body: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub url: Option<String>,
}

/// A classified message. Never persisted; only its side effects are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEvent {
    pub site: String,

    #[serde(rename = "type")]
    pub event_type: InboxEventType,

    pub raw_subject: String,
    pub raw_body: String,

    #[serde(default)]
    pub torrent_id: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub throttle_until: Option<DateTime<Utc>>,

    pub message_id: String,

    #[serde(default)]
    pub message_url: Option<String>,
}

/// Last processed message per site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxCursorRecord {
    pub site: String,

    #[serde(default)]
    pub last_message_id: Option<String>,

    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl InboxCursorRecord {
    pub fn empty(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            last_message_id: None,
            last_checked_at: None,
        }
    }
}
