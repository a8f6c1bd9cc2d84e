// src/engine.rs

//! Engine facade.
//!
//! [`IntelEngine`] wires the watchers, policies, Site Guard and indexer
//! together over a set of repositories and a client registry supplied by the
//! host. It is the only type a scheduler or a file-cleanup job needs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::HttpClientRegistry;
use crate::error::{AppError, Result};
use crate::models::{
    Action, ActionLevel, ActionType, Config, HrStatus, IndexerConfig, IntelSiteProfile,
    ScanBudget, TorrentIndexEntry, TorrentSearchParams,
};
use crate::parsers::ParserRegistry;
use crate::policy::{HrPolicy, InboxPolicy};
use crate::services::{
    HrStateStore, HrWatcher, InboxWatcher, SiteGuard, SyncMode, SyncReport, TorrentIndexer,
};
use crate::storage::{
    HrCasesRepository, InboxCursorRepository, LocalStorage, SiteGuardRepository,
    TorrentIndexRepository,
};
use crate::utils::sync::SiteLocks;

/// The four repositories the engine persists through.
#[derive(Clone)]
pub struct Repositories {
    pub hr_cases: Arc<dyn HrCasesRepository>,
    pub site_guard: Arc<dyn SiteGuardRepository>,
    pub inbox_cursors: Arc<dyn InboxCursorRepository>,
    pub torrent_index: Arc<dyn TorrentIndexRepository>,
}

impl Repositories {
    /// Every repository backed by one [`LocalStorage`].
    pub fn local(storage: Arc<LocalStorage>) -> Self {
        Self {
            hr_cases: storage.clone(),
            site_guard: storage.clone(),
            inbox_cursors: storage.clone(),
            torrent_index: storage,
        }
    }
}

pub struct IntelEngine {
    clients: Arc<HttpClientRegistry>,
    hr_store: Arc<HrStateStore>,
    guard: Arc<SiteGuard>,
    hr_watcher: HrWatcher,
    inbox_watcher: InboxWatcher,
    indexer: TorrentIndexer,
    hr_policy: HrPolicy,
    inbox_policy: InboxPolicy,
    torrent_index: Arc<dyn TorrentIndexRepository>,
    locks: SiteLocks,
}

impl IntelEngine {
    pub fn new(
        config: &Config,
        repos: Repositories,
        clients: Arc<HttpClientRegistry>,
        parsers: ParserRegistry,
    ) -> Self {
        let parsers = Arc::new(parsers);
        let hr_store = Arc::new(HrStateStore::new(repos.hr_cases));
        let guard = Arc::new(SiteGuard::new(repos.site_guard));

        let hr_watcher = HrWatcher::new(clients.clone(), parsers.clone(), hr_store.clone());
        let inbox_watcher = InboxWatcher::new(
            clients.clone(),
            parsers.clone(),
            hr_store.clone(),
            guard.clone(),
            repos.inbox_cursors,
            repos.torrent_index.clone(),
        )
        .with_throttle_default_hours(config.inbox_policy.throttle_default_hours);
        let indexer = TorrentIndexer::new(
            clients.clone(),
            parsers,
            guard.clone(),
            repos.torrent_index.clone(),
        )
        .with_config(config.indexer.clone());

        Self {
            clients,
            hr_store,
            guard,
            hr_watcher,
            inbox_watcher,
            indexer,
            hr_policy: HrPolicy::new(config.hr_policy.clone()),
            inbox_policy: InboxPolicy::new(config.inbox_policy.clone()),
            torrent_index: repos.torrent_index,
            locks: SiteLocks::new(),
        }
    }

    pub fn clients(&self) -> &Arc<HttpClientRegistry> {
        &self.clients
    }

    pub fn hr_store(&self) -> &Arc<HrStateStore> {
        &self.hr_store
    }

    pub fn site_guard(&self) -> &Arc<SiteGuard> {
        &self.guard
    }

    /// HR refresh and policy, then inbox refresh and policy, for one site.
    ///
    /// Failures of either half become `LOG_ONLY` actions; the other half
    /// still runs. Refreshes of the same site are serialized.
    pub async fn refresh_site(&self, profile: &IntelSiteProfile, now: DateTime<Utc>) -> Vec<Action> {
        let site = profile.site.as_str();
        let _lock = self.locks.acquire(site).await;
        let mut actions = Vec::new();

        if let Err(e) = self.hr_watcher.refresh_site(profile, now).await {
            log::warn!("[{}] HR refresh failed: {}", site, e);
            actions.push(failure_action(site, "HR refresh failed", &e));
        }

        if profile.hr.enabled {
            match self.hr_store.list_active_for_site(site).await {
                Ok(records) => {
                    let alive: Vec<_> = records.into_iter().filter(|r| r.is_alive()).collect();
                    actions.extend(self.hr_policy.evaluate(site, &alive, now));
                }
                Err(e) => {
                    log::warn!("[{}] HR records unavailable: {}", site, e);
                    actions.push(failure_action(site, "HR evaluation failed", &e));
                }
            }
        }

        match self.inbox_watcher.refresh_site(profile, now).await {
            Ok(events) => actions.extend(self.inbox_policy.evaluate(&events)),
            Err(e) => {
                log::warn!("[{}] inbox refresh failed: {}", site, e);
                actions.push(failure_action(site, "Inbox refresh failed", &e));
            }
        }

        for action in &mut actions {
            action.created_at.get_or_insert(now);
        }
        merge_actions(actions)
    }

    /// Whether the source files of a torrent may be removed.
    ///
    /// Fails closed: any lookup error answers `false`.
    pub async fn is_move_safe(&self, site: &str, torrent_id: &str, now: DateTime<Utc>) -> bool {
        match self.hr_store.list_active_for_site(site).await {
            Ok(records) => match records.iter().find(|r| r.torrent_id == torrent_id) {
                None => true,
                Some(record) => {
                    let safe = matches!(
                        record.hr_status,
                        HrStatus::None | HrStatus::Finished | HrStatus::Failed
                    ) || record.deadline.is_some_and(|deadline| now >= deadline)
                        || record
                            .required_seed_hours
                            .is_some_and(|required| record.seeded_hours >= required);
                    log::debug!(
                        "[{}] move safety for {}: {} (status {})",
                        site,
                        torrent_id,
                        safe,
                        record.hr_status.as_str()
                    );
                    safe
                }
            },
            Err(e) => {
                log::warn!(
                    "[{}] move safety lookup for {} failed, keeping source: {}",
                    site,
                    torrent_id,
                    e
                );
                false
            }
        }
    }

    /// Run a catalogue sync with the configured page limits unless overridden.
    pub async fn sync_index(
        &self,
        profile: &IntelSiteProfile,
        mode: SyncMode,
        max_pages: Option<u32>,
        now: DateTime<Utc>,
    ) -> SyncReport {
        let config: &IndexerConfig = self.indexer.config();
        match mode {
            SyncMode::Full => {
                let max_pages = max_pages.unwrap_or(config.full_max_pages);
                self.indexer
                    .sync_full(profile, max_pages, config.pages_per_batch, now)
                    .await
            }
            SyncMode::Incremental => {
                let max_pages = max_pages.unwrap_or(config.incremental_max_pages);
                self.indexer.sync_incremental(profile, max_pages, now).await
            }
        }
    }

    pub async fn get_scan_budget(
        &self,
        profile: &IntelSiteProfile,
        now: DateTime<Utc>,
    ) -> Result<ScanBudget> {
        self.guard.get_scan_budget(profile, now).await
    }

    pub async fn search(&self, params: &TorrentSearchParams) -> Result<Vec<TorrentIndexEntry>> {
        self.torrent_index.query_for_search(params).await
    }
}

fn failure_action(site: &str, title: &str, error: &AppError) -> Action {
    Action::new(ActionType::LogOnly, site)
        .with_level(ActionLevel::Error)
        .with_title(title)
        .with_message(error.to_string())
}

/// Keep the last `HR_RECORD_PROGRESS` action per (site, torrent); every other
/// action follows, in input order.
pub fn merge_actions(actions: Vec<Action>) -> Vec<Action> {
    let mut progress: Vec<Action> = Vec::new();
    let mut slots: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut others = Vec::new();

    for action in actions {
        if action.action_type != ActionType::HrRecordProgress {
            others.push(action);
            continue;
        }
        let key = (action.site.clone(), action.torrent_id.clone());
        match slots.get(&key) {
            Some(&slot) => progress[slot] = action,
            None => {
                slots.insert(key, progress.len());
                progress.push(action);
            }
        }
    }

    progress.extend(others);
    progress
}
