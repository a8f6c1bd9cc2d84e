//! Service layer for the intelligence engine.
//!
//! This module contains the stateful components:
//! - HR record cache and mutations (`HrStateStore`)
//! - HR page reconciliation (`HrWatcher`)
//! - Scan budgets and block learning (`SiteGuard`)
//! - Private message polling (`InboxWatcher`)
//! - Listing scans into the catalogue (`TorrentIndexer`)

mod hr_state;
mod hr_watcher;
mod inbox_watcher;
mod indexer;
mod site_guard;

pub use hr_state::HrStateStore;
pub use hr_watcher::{HrRefresh, HrWatcher};
pub use inbox_watcher::{InboxWatcher, PM_THROTTLE_CAUSE, classify};
pub use indexer::{StopReason, SyncMode, SyncReport, TorrentIndexer};
pub use site_guard::SiteGuard;
