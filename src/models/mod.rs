// src/models/mod.rs

//! Domain models for the intelligence engine.
//!
//! This module contains all data structures used throughout the engine,
//! organized by their primary purpose.

pub mod action;
pub mod config;
pub mod guard;
pub mod hr;
pub mod inbox;
pub mod index;
pub mod profile;

// Re-export all public types
pub use action::{Action, ActionLevel, ActionType};
pub use config::{
    Config, EngineConfig, HrPolicyConfig, HttpConfig, InboxPolicyConfig, IndexerConfig,
    LoggingConfig, PathsConfig,
};
pub use guard::{NewBlockEvent, ScanBudget, SiteGuardEvent, SiteThrottleProfile};
pub use hr::{
    DisappearSemantics, HrKey, HrStatus, LifeStatus, ParsedHrPage, ParsedHrRow, TorrentHrRecord,
};
pub use inbox::{InboxCursorRecord, InboxEvent, InboxEventType, InboxMessage};
pub use index::{
    HrFilter, ParsedTorrentRow, SearchSort, TorrentIndexCreate, TorrentIndexEntry,
    TorrentSearchParams,
};
pub use profile::{HrConfig, InboxConfig, IndexerSiteConfig, IntelSiteProfile, SiteGuardConfig};
