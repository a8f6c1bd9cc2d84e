//! Inbox watcher: classifies new private messages and applies their effects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::client::HttpClientRegistry;
use crate::error::Result;
use crate::models::profile::{KEYWORD_DELETE, KEYWORD_PENALTY, KEYWORD_THROTTLE};
use crate::models::{
    InboxCursorRecord, InboxEvent, InboxEventType, InboxMessage, IntelSiteProfile,
};
use crate::parsers::ParserRegistry;
use crate::services::HrStateStore;
use crate::services::SiteGuard;
use crate::storage::{InboxCursorRepository, TorrentIndexRepository};
use crate::utils::{parse_datetime, resolve};

/// Keyword categories in priority order; the first matching category wins.
const CLASSIFICATION: [(&str, InboxEventType); 3] = [
    (KEYWORD_PENALTY, InboxEventType::HrPenalty),
    (KEYWORD_DELETE, InboxEventType::TorrentDeleted),
    (KEYWORD_THROTTLE, InboxEventType::SiteThrottled),
];

/// Cause stored with blocks announced by private message.
pub const PM_THROTTLE_CAUSE: &str = "pm_throttle_notice";

const DEFAULT_THROTTLE_HOURS: i64 = 12;

pub struct InboxWatcher {
    clients: Arc<HttpClientRegistry>,
    parsers: Arc<ParserRegistry>,
    hr_store: Arc<HrStateStore>,
    guard: Arc<SiteGuard>,
    cursors: Arc<dyn InboxCursorRepository>,
    index: Arc<dyn TorrentIndexRepository>,
    throttle_default: Duration,
}

impl InboxWatcher {
    pub fn new(
        clients: Arc<HttpClientRegistry>,
        parsers: Arc<ParserRegistry>,
        hr_store: Arc<HrStateStore>,
        guard: Arc<SiteGuard>,
        cursors: Arc<dyn InboxCursorRepository>,
        index: Arc<dyn TorrentIndexRepository>,
    ) -> Self {
        Self {
            clients,
            parsers,
            hr_store,
            guard,
            cursors,
            index,
            throttle_default: Duration::hours(DEFAULT_THROTTLE_HOURS),
        }
    }

    /// Block length assumed when a throttle notice names no end time.
    pub fn with_throttle_default_hours(mut self, hours: u32) -> Self {
        self.throttle_default = Duration::hours(i64::from(hours));
        self
    }

    /// Poll page 1 of the inbox and process messages newer than the cursor.
    ///
    /// The cursor moves to the newest message of the page only after every
    /// side effect has been applied, so an interrupted poll is replayed.
    pub async fn refresh_site(
        &self,
        profile: &IntelSiteProfile,
        now: DateTime<Utc>,
    ) -> Result<Vec<InboxEvent>> {
        let site = profile.site.as_str();
        if !profile.inbox.enabled {
            log::debug!("[{}] inbox monitoring disabled", site);
            return Ok(Vec::new());
        }
        let Some(client) = self.clients.get(site) else {
            log::debug!("[{}] no HTTP client registered, skipping inbox", site);
            return Ok(Vec::new());
        };

        let cursor = self.cursors.get_cursor(site).await?;
        let html = client.fetch_inbox_page(profile, 1).await?;
        let messages = self.parsers.parse_inbox(profile, &html);

        let cutoff = cursor.last_message_id.as_deref();
        let fresh = messages
            .iter()
            .take_while(|m| Some(m.message_id.as_str()) != cutoff);

        let patterns = torrent_id_patterns(profile);
        let mut events = Vec::new();
        for message in fresh {
            let Some(event) = classify(profile, &patterns, message) else {
                continue;
            };
            self.apply(profile, &event, now).await?;
            events.push(event);
        }

        let last_message_id = messages
            .first()
            .map(|m| m.message_id.clone())
            .or(cursor.last_message_id);
        self.cursors
            .save_cursor(&InboxCursorRecord {
                site: site.to_string(),
                last_message_id,
                last_checked_at: Some(now),
            })
            .await?;

        if !events.is_empty() {
            log::info!("[{}] {} new classified inbox events", site, events.len());
        }
        Ok(events)
    }

    async fn apply(
        &self,
        profile: &IntelSiteProfile,
        event: &InboxEvent,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let site = profile.site.as_str();
        match (event.event_type, event.torrent_id.as_deref()) {
            (InboxEventType::HrPenalty, Some(torrent_id)) => {
                self.hr_store.mark_penalized(site, torrent_id, now).await?;
            }
            (InboxEventType::TorrentDeleted, Some(torrent_id)) => {
                self.hr_store.mark_deleted(site, torrent_id, now).await?;
                match self.index.mark_deleted(site, torrent_id, now).await {
                    Ok(true) => log::info!("[{}] index entry {} marked deleted", site, torrent_id),
                    Ok(false) => {}
                    Err(e) => log::warn!(
                        "[{}] failed to mark index entry {} deleted: {}",
                        site,
                        torrent_id,
                        e
                    ),
                }
            }
            (InboxEventType::SiteThrottled, _) => {
                let until = event.throttle_until.unwrap_or(now + self.throttle_default);
                self.guard
                    .record_block_event(profile, until, PM_THROTTLE_CAUSE, None, None, now)
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn torrent_id_patterns(profile: &IntelSiteProfile) -> Vec<Regex> {
    profile
        .inbox
        .torrent_id_patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                log::warn!("[{}] ignoring torrent id pattern '{}': {}", profile.site, pattern, e);
                None
            }
        })
        .collect()
}

/// Classify a message against the profile's keyword table.
///
/// Matching is a case-insensitive substring test over subject and body.
/// Messages matching no category yield `None`.
pub fn classify(
    profile: &IntelSiteProfile,
    patterns: &[Regex],
    message: &InboxMessage,
) -> Option<InboxEvent> {
    let subject = message.subject.to_lowercase();
    let body = message.body.to_lowercase();

    let event_type = CLASSIFICATION.iter().find_map(|(category, event_type)| {
        let keywords = profile.inbox.pm_keywords.get(*category)?;
        keywords
            .iter()
            .map(|k| k.to_lowercase())
            .any(|k| !k.is_empty() && (subject.contains(&k) || body.contains(&k)))
            .then_some(*event_type)
    })?;

    let torrent_id = [&message.subject, &message.body]
        .into_iter()
        .find_map(|text| {
            patterns
                .iter()
                .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
                .map(|m| m.as_str().to_string())
        });

    let throttle_until = (event_type == InboxEventType::SiteThrottled)
        .then(|| parse_datetime(&message.body).or_else(|| parse_datetime(&message.subject)))
        .flatten();

    Some(InboxEvent {
        site: profile.site.clone(),
        event_type,
        raw_subject: message.subject.clone(),
        raw_body: message.body.clone(),
        torrent_id,
        created_at: message.created_at,
        throttle_until,
        message_id: message.message_id.clone(),
        message_url: message.url.as_deref().map(|href| {
            profile
                .base_url
                .as_deref()
                .and_then(|base| resolve(base, href))
                .unwrap_or_else(|| href.to_string())
        }),
    })
}
