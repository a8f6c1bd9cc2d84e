//! Inbox policy: maps classified inbox events to actions.

use crate::models::{Action, ActionLevel, ActionType, InboxEvent, InboxEventType, InboxPolicyConfig};

#[derive(Debug, Clone, Default)]
pub struct InboxPolicy {
    config: InboxPolicyConfig,
}

impl InboxPolicy {
    pub fn new(config: InboxPolicyConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, events: &[InboxEvent]) -> Vec<Action> {
        events.iter().flat_map(|e| self.evaluate_event(e)).collect()
    }

    /// One or two actions per event; nothing is dropped.
    pub fn evaluate_event(&self, event: &InboxEvent) -> Vec<Action> {
        let (action_type, level, title) = match event.event_type {
            InboxEventType::HrPenalty => (
                ActionType::TorrentHrPenalty,
                self.config.penalty_level,
                "HR penalty received",
            ),
            InboxEventType::TorrentDeleted => (
                ActionType::TorrentDeletedRemote,
                self.config.delete_level,
                "Torrent deleted by site",
            ),
            InboxEventType::SiteThrottled => (
                ActionType::SiteThrottled,
                ActionLevel::Warning,
                "Site access throttled",
            ),
            InboxEventType::Other => {
                return vec![
                    self.base(event, ActionType::LogOnly, ActionLevel::Info)
                        .with_title(event.raw_subject.clone())
                        .with_message(event.raw_body.clone()),
                ];
            }
        };

        let primary = self
            .base(event, action_type, level)
            .with_title(title)
            .with_message(event.raw_subject.clone());
        let primary = match event.throttle_until {
            Some(until) => primary.with_payload("throttle_until", until.to_rfc3339()),
            None => primary,
        };

        let notification = self
            .base(event, ActionType::UserNotification, level)
            .with_title(format!("[{}] {}", event.site, title))
            .with_message(notification_message(event));

        vec![primary, notification]
    }

    fn base(&self, event: &InboxEvent, action_type: ActionType, level: ActionLevel) -> Action {
        let mut action = Action::new(action_type, &event.site)
            .with_optional_torrent(event.torrent_id.clone())
            .with_level(level)
            .with_payload("message_id", event.message_id.as_str())
            .with_payload("message_url", event.message_url.clone());
        action.created_at = event.created_at;
        action
    }
}

fn notification_message(event: &InboxEvent) -> String {
    match (&event.torrent_id, event.throttle_until) {
        (_, Some(until)) => format!("{} (until {})", event.raw_subject, until),
        (Some(torrent_id), None) => format!("{} (torrent {})", event.raw_subject, torrent_id),
        (None, None) => event.raw_subject.clone(),
    }
}
