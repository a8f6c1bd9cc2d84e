//! Repository abstractions for engine state.
//!
//! The engine depends only on these traits; any key-addressable store can
//! back them. [`LocalStorage`] is the bundled JSON-file implementation.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── hr_cases.json             # TorrentHrRecord per (site, torrent_id)
//! ├── site_guard_profiles.json  # SiteThrottleProfile per site
//! ├── site_guard_events.json    # Append-only block event log
//! ├── inbox_cursors.json        # InboxCursorRecord per site
//! └── torrent_index.json        # TorrentIndexEntry per (site_id, torrent_id)
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    InboxCursorRecord, NewBlockEvent, SiteGuardEvent, SiteThrottleProfile, TorrentHrRecord,
    TorrentIndexCreate, TorrentIndexEntry, TorrentSearchParams,
};

// Re-export for convenience
pub use local::LocalStorage;

/// Durable HR records.
#[async_trait]
pub trait HrCasesRepository: Send + Sync {
    async fn get(&self, site: &str, torrent_id: &str) -> Result<Option<TorrentHrRecord>>;

    /// Insert or replace the record for its (site, torrent_id).
    async fn upsert(&self, record: &TorrentHrRecord) -> Result<()>;

    /// Every record tracked for the site, regardless of status.
    async fn list_active_for_site(&self, site: &str) -> Result<Vec<TorrentHrRecord>>;
}

/// Learned throttle profiles and the block event log.
#[async_trait]
pub trait SiteGuardRepository: Send + Sync {
    async fn get_profile(&self, site: &str) -> Result<Option<SiteThrottleProfile>>;

    async fn save_profile(&self, profile: &SiteThrottleProfile) -> Result<()>;

    /// Append a block event and return it with its assigned id.
    async fn record_block_event(&self, event: NewBlockEvent) -> Result<SiteGuardEvent>;

    /// Most recently recorded block event of the site.
    async fn get_latest_block(&self, site: &str) -> Result<Option<SiteGuardEvent>>;
}

/// Inbox polling cursors.
#[async_trait]
pub trait InboxCursorRepository: Send + Sync {
    /// Cursor of the site; an empty cursor when never polled.
    async fn get_cursor(&self, site: &str) -> Result<InboxCursorRecord>;

    async fn save_cursor(&self, cursor: &InboxCursorRecord) -> Result<()>;
}

/// Local torrent catalogue.
#[async_trait]
pub trait TorrentIndexRepository: Send + Sync {
    /// Insert new rows and merge known fields into existing ones, clearing
    /// any deletion mark. Returns the number of rows written.
    async fn upsert_many(&self, rows: &[TorrentIndexCreate]) -> Result<usize>;

    /// Flag an entry as deleted on the site. Returns whether it existed.
    async fn mark_deleted(
        &self,
        site_id: &str,
        torrent_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn query_for_search(&self, params: &TorrentSearchParams)
    -> Result<Vec<TorrentIndexEntry>>;

    async fn get_by_site_and_torrent_id(
        &self,
        site_id: &str,
        torrent_id: &str,
    ) -> Result<Option<TorrentIndexEntry>>;
}
