//! Local torrent catalogue entries and search parameters.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalogue row stored in the torrent index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentIndexEntry {
    pub site_id: String,
    pub torrent_id: String,
    pub title_raw: String,

    #[serde(default)]
    pub title_clean: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub is_hr: bool,

    #[serde(default)]
    pub is_free: bool,

    #[serde(default)]
    pub is_half_free: bool,

    #[serde(default)]
    pub size_bytes: Option<u64>,

    #[serde(default)]
    pub seeders: u32,

    #[serde(default)]
    pub leechers: u32,

    #[serde(default)]
    pub completed: Option<u32>,

    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    pub last_seen_at: DateTime<Utc>,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TorrentIndexEntry {
    /// Build a fresh entry from an upsert row.
    pub fn from_row(row: &TorrentIndexCreate) -> Self {
        Self {
            site_id: row.site_id.clone(),
            torrent_id: row.torrent_id.clone(),
            title_raw: row.title_raw.clone(),
            title_clean: row.title_clean.clone(),
            category: row.category.clone(),
            is_hr: row.is_hr,
            is_free: row.is_free,
            is_half_free: row.is_half_free,
            size_bytes: row.size_bytes,
            seeders: row.seeders,
            leechers: row.leechers,
            completed: row.completed,
            published_at: row.published_at,
            last_seen_at: row.last_seen_at,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Merge a later sighting: known-non-null fields win, deletion is cleared.
    pub fn merge(&mut self, row: &TorrentIndexCreate) {
        self.title_raw = row.title_raw.clone();
        if row.title_clean.is_some() {
            self.title_clean = row.title_clean.clone();
        }
        if row.category.is_some() {
            self.category = row.category.clone();
        }
        self.is_hr = row.is_hr;
        self.is_free = row.is_free;
        self.is_half_free = row.is_half_free;
        if row.size_bytes.is_some() {
            self.size_bytes = row.size_bytes;
        }
        self.seeders = row.seeders;
        self.leechers = row.leechers;
        if row.completed.is_some() {
            self.completed = row.completed;
        }
        if row.published_at.is_some() {
            self.published_at = row.published_at;
        }
        self.last_seen_at = row.last_seen_at;
        self.is_deleted = false;
        self.deleted_at = None;
    }
}

/// A parsed listing row ready to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentIndexCreate {
    pub site_id: String,
    pub torrent_id: String,
    pub title_raw: String,
    pub title_clean: Option<String>,
    pub category: Option<String>,
    pub is_hr: bool,
    pub is_free: bool,
    pub is_half_free: bool,
    pub size_bytes: Option<u64>,
    pub seeders: u32,
    pub leechers: u32,
    pub completed: Option<u32>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
}

/// One row of a torrent listing page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTorrentRow {
    pub torrent_id: String,
    pub title_raw: String,
    pub title_clean: Option<String>,
    pub category: Option<String>,
    pub is_hr: bool,
    pub is_free: bool,
    pub is_half_free: bool,
    pub size_bytes: Option<u64>,
    pub seeders: u32,
    pub leechers: u32,
    pub completed: Option<u32>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ParsedTorrentRow {
    pub fn into_create(self, site_id: &str, seen_at: DateTime<Utc>) -> TorrentIndexCreate {
        TorrentIndexCreate {
            site_id: site_id.to_string(),
            torrent_id: self.torrent_id,
            title_raw: self.title_raw,
            title_clean: self.title_clean,
            category: self.category,
            is_hr: self.is_hr,
            is_free: self.is_free,
            is_half_free: self.is_half_free,
            size_bytes: self.size_bytes,
            seeders: self.seeders,
            leechers: self.leechers,
            completed: self.completed,
            published_at: self.published_at,
            last_seen_at: seen_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HrFilter {
    #[default]
    Any,
    ExcludeHr,
    HrOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    /// Newest first, then most seeded
    #[default]
    Default,
    Seeders,
    PublishedAt,
    Size,
}

/// Filters for `TorrentIndexRepository::query_for_search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub site_ids: Vec<String>,
    #[serde(default)]
    pub hr_filter: HrFilter,
    #[serde(default)]
    pub min_seeders: Option<u32>,
    #[serde(default)]
    pub max_seeders: Option<u32>,
    #[serde(default)]
    pub min_size_bytes: Option<u64>,
    #[serde(default)]
    pub max_size_bytes: Option<u64>,
    #[serde(default = "default_true")]
    pub exclude_deleted: bool,
    #[serde(default)]
    pub sort: SearchSort,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    50
}

impl Default for TorrentSearchParams {
    fn default() -> Self {
        Self {
            keyword: None,
            category: None,
            site_ids: Vec::new(),
            hr_filter: HrFilter::Any,
            min_seeders: None,
            max_seeders: None,
            min_size_bytes: None,
            max_size_bytes: None,
            exclude_deleted: true,
            sort: SearchSort::Default,
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl TorrentSearchParams {
    /// Whether an entry passes every filter.
    pub fn matches(&self, entry: &TorrentIndexEntry) -> bool {
        if self.exclude_deleted && entry.is_deleted {
            return false;
        }
        if let Some(keyword) = &self.keyword {
            if !entry
                .title_raw
                .to_lowercase()
                .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if entry.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if !self.site_ids.is_empty() && !self.site_ids.contains(&entry.site_id) {
            return false;
        }
        match self.hr_filter {
            HrFilter::ExcludeHr if entry.is_hr => return false,
            HrFilter::HrOnly if !entry.is_hr => return false,
            _ => {}
        }
        if self.min_seeders.is_some_and(|min| entry.seeders < min) {
            return false;
        }
        if self.max_seeders.is_some_and(|max| entry.seeders > max) {
            return false;
        }
        // Size bounds exclude entries of unknown size, like a SQL comparison against NULL.
        if let Some(min) = self.min_size_bytes {
            if !entry.size_bytes.is_some_and(|size| size >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_size_bytes {
            if !entry.size_bytes.is_some_and(|size| size <= max) {
                return false;
            }
        }
        true
    }

    /// Filter, sort and paginate a set of entries.
    pub fn apply<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a TorrentIndexEntry>,
    ) -> Vec<TorrentIndexEntry> {
        let mut hits: Vec<TorrentIndexEntry> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();

        match self.sort {
            SearchSort::Seeders => hits.sort_by(|a, b| b.seeders.cmp(&a.seeders)),
            SearchSort::PublishedAt => {
                hits.sort_by(|a, b| desc_nulls_last(&a.published_at, &b.published_at))
            }
            SearchSort::Size => hits.sort_by(|a, b| desc_nulls_last(&a.size_bytes, &b.size_bytes)),
            SearchSort::Default => hits.sort_by(|a, b| {
                desc_nulls_last(&a.published_at, &b.published_at)
                    .then_with(|| b.seeders.cmp(&a.seeders))
            }),
        }

        hits.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

fn desc_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
