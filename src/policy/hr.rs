//! HR policy: turns tracked records into progress, safe and risk actions.

use chrono::{DateTime, Utc};

use crate::models::{Action, ActionLevel, ActionType, HrPolicyConfig, HrStatus, TorrentHrRecord};

#[derive(Debug, Clone, Default)]
pub struct HrPolicy {
    config: HrPolicyConfig,
}

impl HrPolicy {
    pub fn new(config: HrPolicyConfig) -> Self {
        Self { config }
    }

    /// One progress action per record, plus a safe or risk verdict when the
    /// record's state allows one.
    pub fn evaluate(
        &self,
        site: &str,
        records: &[TorrentHrRecord],
        now: DateTime<Utc>,
    ) -> Vec<Action> {
        let mut actions = Vec::with_capacity(records.len() * 2);
        for record in records {
            actions.push(progress_action(site, record));

            match record.hr_status {
                HrStatus::None | HrStatus::Finished => {
                    actions.push(
                        Action::new(ActionType::HrMarkSafe, site)
                            .with_torrent(&record.torrent_id)
                            .with_title("HR requirement cleared")
                            .with_payload("hr_status", record.hr_status.as_str()),
                    );
                }
                HrStatus::Active | HrStatus::Unknown => {
                    if let Some(action) = self.risk_action(site, record, now) {
                        actions.push(action);
                    }
                }
                HrStatus::Failed => {}
            }
        }
        actions
    }

    fn risk_action(
        &self,
        site: &str,
        record: &TorrentHrRecord,
        now: DateTime<Utc>,
    ) -> Option<Action> {
        let deadline = record.deadline?;
        let base = Action::new(ActionType::HrMarkRisk, site)
            .with_torrent(&record.torrent_id)
            .with_payload("deadline", deadline.to_rfc3339());

        if now >= deadline {
            return Some(
                base.with_level(ActionLevel::Error)
                    .with_title("HR deadline passed")
                    .with_message(format!(
                        "Torrent {} passed its HR deadline with {:.1}h seeded",
                        record.torrent_id, record.seeded_hours
                    )),
            );
        }

        let remaining_hours = (deadline - now).num_milliseconds() as f64 / 3_600_000.0;
        if remaining_hours <= self.config.risk_threshold_hours {
            return Some(
                base.with_level(ActionLevel::Warning)
                    .with_title("HR deadline approaching")
                    .with_message(format!(
                        "Torrent {} has {:.2}h left to meet its HR requirement",
                        record.torrent_id, remaining_hours
                    ))
                    .with_payload("remaining_hours", remaining_hours),
            );
        }
        None
    }
}

fn progress_action(site: &str, record: &TorrentHrRecord) -> Action {
    Action::new(ActionType::HrRecordProgress, site)
        .with_torrent(&record.torrent_id)
        .with_payload("ratio", record.progress_ratio())
        .with_payload("seeded_hours", record.seeded_hours)
        .with_payload("required_seed_hours", record.required_seed_hours)
        .with_payload("hr_status", record.hr_status.as_str())
        .with_payload("life_status", record.life_status.as_str())
}
