//! Local filesystem storage implementation.
//!
//! Each repository is one pretty-printed JSON array under the storage root.
//! Writes go to a temp file which is then renamed over the target, so a crash
//! mid-write leaves the previous contents intact. Read-modify-write cycles
//! are serialised by a lock shared between clones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    InboxCursorRecord, NewBlockEvent, SiteGuardEvent, SiteThrottleProfile, TorrentHrRecord,
    TorrentIndexCreate, TorrentIndexEntry, TorrentSearchParams,
};
use crate::storage::{
    HrCasesRepository, InboxCursorRepository, SiteGuardRepository, TorrentIndexRepository,
};

const HR_CASES: &str = "hr_cases.json";
const GUARD_PROFILES: &str = "site_guard_profiles.json";
const GUARD_EVENTS: &str = "site_guard_events.json";
const INBOX_CURSORS: &str = "inbox_cursors.json";
const TORRENT_INDEX: &str = "torrent_index.json";

/// Event type recorded for every observed block.
pub const BLOCK_EVENT: &str = "block";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read a JSON array; a missing file is an empty list.
    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::storage(format!("{key} is corrupt: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HrCasesRepository for LocalStorage {
    async fn get(&self, site: &str, torrent_id: &str) -> Result<Option<TorrentHrRecord>> {
        let records: Vec<TorrentHrRecord> = self.read_list(HR_CASES).await?;
        Ok(records
            .into_iter()
            .find(|r| r.site == site && r.torrent_id == torrent_id))
    }

    async fn upsert(&self, record: &TorrentHrRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<TorrentHrRecord> = self.read_list(HR_CASES).await?;
        match records
            .iter_mut()
            .find(|r| r.site == record.site && r.torrent_id == record.torrent_id)
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        self.write_json(HR_CASES, &records).await
    }

    async fn list_active_for_site(&self, site: &str) -> Result<Vec<TorrentHrRecord>> {
        let records: Vec<TorrentHrRecord> = self.read_list(HR_CASES).await?;
        Ok(records.into_iter().filter(|r| r.site == site).collect())
    }
}

#[async_trait]
impl SiteGuardRepository for LocalStorage {
    async fn get_profile(&self, site: &str) -> Result<Option<SiteThrottleProfile>> {
        let profiles: Vec<SiteThrottleProfile> = self.read_list(GUARD_PROFILES).await?;
        Ok(profiles.into_iter().find(|p| p.site == site))
    }

    async fn save_profile(&self, profile: &SiteThrottleProfile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut profiles: Vec<SiteThrottleProfile> = self.read_list(GUARD_PROFILES).await?;
        match profiles.iter_mut().find(|p| p.site == profile.site) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        profiles.sort_by(|a, b| a.site.cmp(&b.site));
        self.write_json(GUARD_PROFILES, &profiles).await
    }

    async fn record_block_event(&self, event: NewBlockEvent) -> Result<SiteGuardEvent> {
        let _guard = self.write_lock.lock().await;
        let mut events: Vec<SiteGuardEvent> = self.read_list(GUARD_EVENTS).await?;
        let id = events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let recorded = SiteGuardEvent {
            id,
            site: event.site,
            event_type: BLOCK_EVENT.to_string(),
            created_at: event.created_at,
            block_until: event.block_until,
            cause: event.cause,
            scan_minutes_before_block: event.scan_minutes_before_block,
            scan_pages_before_block: event.scan_pages_before_block,
        };
        events.push(recorded.clone());
        self.write_json(GUARD_EVENTS, &events).await?;
        Ok(recorded)
    }

    async fn get_latest_block(&self, site: &str) -> Result<Option<SiteGuardEvent>> {
        let events: Vec<SiteGuardEvent> = self.read_list(GUARD_EVENTS).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.site == site)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
    }
}

#[async_trait]
impl InboxCursorRepository for LocalStorage {
    async fn get_cursor(&self, site: &str) -> Result<InboxCursorRecord> {
        let cursors: Vec<InboxCursorRecord> = self.read_list(INBOX_CURSORS).await?;
        Ok(cursors
            .into_iter()
            .find(|c| c.site == site)
            .unwrap_or_else(|| InboxCursorRecord::empty(site)))
    }

    async fn save_cursor(&self, cursor: &InboxCursorRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut cursors: Vec<InboxCursorRecord> = self.read_list(INBOX_CURSORS).await?;
        match cursors.iter_mut().find(|c| c.site == cursor.site) {
            Some(existing) => *existing = cursor.clone(),
            None => cursors.push(cursor.clone()),
        }
        self.write_json(INBOX_CURSORS, &cursors).await
    }
}

#[async_trait]
impl TorrentIndexRepository for LocalStorage {
    async fn upsert_many(&self, rows: &[TorrentIndexCreate]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<TorrentIndexEntry> = self.read_list(TORRENT_INDEX).await?;
        let mut positions: HashMap<(String, String), usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.site_id.clone(), e.torrent_id.clone()), i))
            .collect();

        for row in rows {
            let key = (row.site_id.clone(), row.torrent_id.clone());
            match positions.get(&key) {
                Some(&i) => entries[i].merge(row),
                None => {
                    positions.insert(key, entries.len());
                    entries.push(TorrentIndexEntry::from_row(row));
                }
            }
        }

        self.write_json(TORRENT_INDEX, &entries).await?;
        Ok(rows.len())
    }

    async fn mark_deleted(
        &self,
        site_id: &str,
        torrent_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<TorrentIndexEntry> = self.read_list(TORRENT_INDEX).await?;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.site_id == site_id && e.torrent_id == torrent_id)
        else {
            return Ok(false);
        };
        entry.is_deleted = true;
        entry.deleted_at = Some(deleted_at);
        self.write_json(TORRENT_INDEX, &entries).await?;
        Ok(true)
    }

    async fn query_for_search(
        &self,
        params: &TorrentSearchParams,
    ) -> Result<Vec<TorrentIndexEntry>> {
        let entries: Vec<TorrentIndexEntry> = self.read_list(TORRENT_INDEX).await?;
        Ok(params.apply(&entries))
    }

    async fn get_by_site_and_torrent_id(
        &self,
        site_id: &str,
        torrent_id: &str,
    ) -> Result<Option<TorrentIndexEntry>> {
        let entries: Vec<TorrentIndexEntry> = self.read_list(TORRENT_INDEX).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.site_id == site_id && e.torrent_id == torrent_id))
    }
}
