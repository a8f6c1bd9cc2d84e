//! Torrent indexer: scans a site's listing pages into the local catalogue.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::{FetchRequest, HttpClientRegistry};
use crate::models::{IndexerConfig, IntelSiteProfile, TorrentIndexCreate};
use crate::parsers::ParserRegistry;
use crate::pipeline::circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
use crate::services::SiteGuard;
use crate::storage::TorrentIndexRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// Why a sync run stopped scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A page returned no rows
    EndOfListing,
    /// A non-first page returned fewer rows than a full page
    LikelyLastPage,
    /// Too many consecutive fetch failures
    CircuitBreaker,
    /// Page limit or scan budget reached
    MaxPages,
    /// Site Guard reported an active block
    Blocked,
    /// The scan ran for the budget's `max_minutes`
    TimeBudget,
    /// No HTTP client registered for the site
    NotConfigured,
}

/// Outcome of one sync run. Partial results are still written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub site: String,
    pub mode: SyncMode,
    pub success: bool,
    pub pages_scanned: u32,
    pub records_found: usize,
    pub records_written: usize,
    pub errors: Vec<String>,
    pub stop_reason: StopReason,
}

impl SyncReport {
    fn new(site: &str, mode: SyncMode) -> Self {
        Self {
            site: site.to_string(),
            mode,
            success: true,
            pages_scanned: 0,
            records_found: 0,
            records_written: 0,
            errors: Vec::new(),
            stop_reason: StopReason::EndOfListing,
        }
    }
}

/// Scan parameters shared by both sync modes.
struct ScanPlan {
    mode: SyncMode,
    max_pages: u32,
    /// Pages between two guard checks; `None` checks only before page 1
    guard_every: Option<u32>,
    delay: Duration,
}

pub struct TorrentIndexer {
    clients: Arc<HttpClientRegistry>,
    parsers: Arc<ParserRegistry>,
    guard: Arc<SiteGuard>,
    repo: Arc<dyn TorrentIndexRepository>,
    config: IndexerConfig,
}

impl TorrentIndexer {
    pub fn new(
        clients: Arc<HttpClientRegistry>,
        parsers: Arc<ParserRegistry>,
        guard: Arc<SiteGuard>,
        repo: Arc<dyn TorrentIndexRepository>,
    ) -> Self {
        Self {
            clients,
            parsers,
            guard,
            repo,
            config: IndexerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Walk the listing from page 1, re-checking the scan budget every
    /// `pages_per_batch` pages.
    pub async fn sync_full(
        &self,
        profile: &IntelSiteProfile,
        max_pages: u32,
        pages_per_batch: u32,
        now: DateTime<Utc>,
    ) -> SyncReport {
        let plan = ScanPlan {
            mode: SyncMode::Full,
            max_pages,
            guard_every: Some(pages_per_batch.max(1)),
            delay: self.config.full_page_delay(),
        };
        self.sync(profile, plan, now).await
    }

    /// Scan only the newest `max_pages` listing pages.
    pub async fn sync_incremental(
        &self,
        profile: &IntelSiteProfile,
        max_pages: u32,
        now: DateTime<Utc>,
    ) -> SyncReport {
        let plan = ScanPlan {
            mode: SyncMode::Incremental,
            max_pages,
            guard_every: None,
            delay: self.config.incremental_page_delay(),
        };
        self.sync(profile, plan, now).await
    }

    async fn sync(
        &self,
        profile: &IntelSiteProfile,
        plan: ScanPlan,
        now: DateTime<Utc>,
    ) -> SyncReport {
        let site = profile.site.as_str();
        let mut report = SyncReport::new(site, plan.mode);

        let Some(client) = self.clients.get(site) else {
            log::debug!("[{}] no HTTP client registered, skipping index sync", site);
            report.stop_reason = StopReason::NotConfigured;
            return report;
        };

        log::info!(
            "[{}] {:?} index sync starting (max {} pages)",
            site,
            plan.mode,
            plan.max_pages
        );

        let mut breaker = CircuitBreaker::with_threshold(self.config.max_consecutive_failures);
        let mut batch: Vec<TorrentIndexCreate> = Vec::new();
        let mut cap = plan.max_pages;
        let mut deadline: Option<Instant> = None;
        let mut page: u32 = 1;

        report.stop_reason = loop {
            if page > cap {
                break StopReason::MaxPages;
            }

            let check_guard = page == 1
                || plan
                    .guard_every
                    .is_some_and(|every| (page - 1) % every == 0);
            if check_guard {
                match self.guard.get_scan_budget(profile, now).await {
                    Ok(budget) if budget.blocked => {
                        log::warn!(
                            "[{}] site guard block ({}) until {:?}, stopping after {} pages",
                            site,
                            budget.reason.as_deref().unwrap_or("unknown"),
                            budget.until,
                            report.pages_scanned
                        );
                        break StopReason::Blocked;
                    }
                    Ok(budget) => {
                        let allowed = (page - 1).saturating_add(budget.max_pages);
                        if allowed < cap {
                            log::info!(
                                "[{}] scan budget caps this sync at page {}",
                                site,
                                allowed
                            );
                            cap = allowed;
                        }
                        let allowed_until = Instant::now()
                            + Duration::from_secs(u64::from(budget.max_minutes) * 60);
                        deadline = Some(deadline.map_or(allowed_until, |d| d.min(allowed_until)));
                        if page > cap {
                            break StopReason::MaxPages;
                        }
                    }
                    Err(e) => {
                        log::warn!("[{}] scan budget unavailable: {}", site, e);
                        report.errors.push(format!("site guard: {}", e));
                        break StopReason::Blocked;
                    }
                }
            }

            if page > 1 {
                tokio::time::sleep(plan.delay).await;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::info!(
                    "[{}] scan time budget used up after {} pages",
                    site,
                    report.pages_scanned
                );
                break StopReason::TimeBudget;
            }

            let path = profile.indexer.page_path(page);
            let html = match client.fetch(&path, &FetchRequest::get()).await {
                Ok(html) => {
                    breaker.record_success();
                    html
                }
                Err(e) => {
                    log::warn!("[{}] listing page {} failed: {}", site, page, e);
                    report.errors.push(format!("page {}: {}", page, e));
                    if let CircuitBreakerResult::Tripped {
                        consecutive_failures,
                    } = breaker.record_failure()
                    {
                        log::error!(
                            "[{}] circuit breaker tripped after {} consecutive failures",
                            site,
                            consecutive_failures
                        );
                        break StopReason::CircuitBreaker;
                    }
                    page += 1;
                    continue;
                }
            };

            report.pages_scanned += 1;
            let rows = self.parsers.parse_torrent_list(profile, &html);
            let count = rows.len();
            report.records_found += count;
            batch.extend(rows.into_iter().map(|row| row.into_create(site, now)));
            log::debug!("[{}] page {}: {} rows", site, page, count);

            if count == 0 {
                break StopReason::EndOfListing;
            }
            if page > 1 && count < self.config.min_rows_per_page {
                break StopReason::LikelyLastPage;
            }
            page += 1;
        };

        if !batch.is_empty() {
            match self.repo.upsert_many(&batch).await {
                Ok(written) => report.records_written = written,
                Err(e) => {
                    log::error!("[{}] index upsert failed: {}", site, e);
                    report.errors.push(format!("upsert: {}", e));
                    report.success = false;
                }
            }
        }
        if report.stop_reason == StopReason::CircuitBreaker {
            report.success = false;
        }

        log::info!(
            "[{}] index sync done: {} pages, {} rows found, {} written, stop {:?}",
            site,
            report.pages_scanned,
            report.records_found,
            report.records_written,
            report.stop_reason
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::StaticSiteClient;
    use crate::models::TorrentSearchParams;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        repo: Arc<LocalStorage>,
        guard: Arc<SiteGuard>,
        indexer: TorrentIndexer,
    }

    fn fixture(client: StaticSiteClient) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let repo = Arc::new(LocalStorage::new(tmp.path()));
        let clients = Arc::new(HttpClientRegistry::new());
        clients.register("hdsky", Arc::new(client));
        let guard = Arc::new(SiteGuard::new(repo.clone()));
        let indexer = TorrentIndexer::new(
            clients,
            Arc::new(ParserRegistry::default()),
            guard.clone(),
            repo.clone(),
        );
        Fixture {
            _tmp: tmp,
            repo,
            guard,
            indexer,
        }
    }

    /// A listing page with `rows` torrents numbered from `first_id`.
    fn listing(first_id: u32, rows: u32) -> String {
        let body: String = (first_id..first_id + rows)
            .map(|id| {
                format!(
                    "<tr><td>Movies</td>\
                     <td><a href=\"details.php?id={id}\">Movie {id} 1080p</a></td>\
                     <td>1.5 GB</td><td>{id}</td><td>1</td></tr>"
                )
            })
            .collect();
        format!(
            "<table><tr><th>Type</th><th>Torrent</th><th>Size</th>\
             <th>Seeders</th><th>Leechers</th></tr>{body}</table>"
        )
    }

    fn client_with_pages(full_pages: u32, per_page: u32) -> StaticSiteClient {
        (1..=full_pages).fold(StaticSiteClient::new(), |client, page| {
            client.page(
                &format!("browse.php?page={page}"),
                listing(page * 1000, per_page),
            )
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_sync_stops_on_empty_page() {
        let client = client_with_pages(6, 25).page("browse.php?page=7", listing(0, 0));
        let f = fixture(client);
        let profile = IntelSiteProfile::new("hdsky");

        let report = f.indexer.sync_full(&profile, 100, 10, Utc::now()).await;
        assert!(report.success);
        assert_eq!(report.pages_scanned, 7);
        assert!(report.errors.is_empty());
        assert_eq!(report.stop_reason, StopReason::EndOfListing);
        assert_eq!(report.records_found, 150);
        assert_eq!(report.records_written, 150);

        let hits = f
            .repo
            .query_for_search(&TorrentSearchParams {
                limit: 1000,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_page_is_likely_last() {
        let client = client_with_pages(2, 25).page("browse.php?page=3", listing(3000, 5));
        let f = fixture(client);
        let report = f
            .indexer
            .sync_full(&IntelSiteProfile::new("hdsky"), 100, 10, Utc::now())
            .await;
        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.stop_reason, StopReason::LikelyLastPage);
        assert_eq!(report.records_written, 55);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_first_page_continues() {
        let client = StaticSiteClient::new()
            .page("browse.php?page=1", listing(1, 5))
            .page("browse.php?page=2", listing(0, 0));
        let f = fixture(client);
        let report = f
            .indexer
            .sync_incremental(&IntelSiteProfile::new("hdsky"), 5, Utc::now())
            .await;
        assert_eq!(report.pages_scanned, 2);
        assert_eq!(report.stop_reason, StopReason::EndOfListing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_after_three_failures() {
        let client = client_with_pages(1, 25)
            .failing("browse.php?page=2")
            .failing("browse.php?page=3")
            .failing("browse.php?page=4");
        let f = fixture(client);
        let report = f
            .indexer
            .sync_full(&IntelSiteProfile::new("hdsky"), 100, 10, Utc::now())
            .await;
        assert!(!report.success);
        assert_eq!(report.stop_reason, StopReason::CircuitBreaker);
        assert_eq!(report.pages_scanned, 1);
        assert_eq!(report.errors.len(), 3);
        // Rows from pages fetched before the trip are kept.
        assert_eq!(report.records_written, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_pages_and_inter_page_delay() {
        let f = fixture(client_with_pages(10, 25));
        let start = tokio::time::Instant::now();
        let report = f
            .indexer
            .sync_incremental(&IntelSiteProfile::new("hdsky"), 3, Utc::now())
            .await;
        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.stop_reason, StopReason::MaxPages);
        // Two 500 ms gaps between three fetches.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_site_is_not_scanned() {
        let f = fixture(client_with_pages(3, 25));
        let profile = IntelSiteProfile::new("hdsky");
        let now = Utc::now();
        f.guard
            .record_block_event(&profile, now + chrono::Duration::hours(1), "http_429", None, None, now)
            .await
            .unwrap();

        let report = f.indexer.sync_full(&profile, 100, 10, now).await;
        assert_eq!(report.stop_reason, StopReason::Blocked);
        assert_eq!(report.pages_scanned, 0);
        assert_eq!(report.records_written, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_caps_pages() {
        let f = fixture(client_with_pages(10, 25));
        let mut profile = IntelSiteProfile::new("hdsky");
        profile.site_guard.default_safe_pages_per_hour = 4;

        let report = f.indexer.sync_full(&profile, 100, 10, Utc::now()).await;
        assert_eq!(report.pages_scanned, 4);
        assert_eq!(report.stop_reason, StopReason::MaxPages);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget_stops_scan() {
        let f = fixture(client_with_pages(100, 25));
        let mut profile = IntelSiteProfile::new("hdsky");
        profile.site_guard.default_safe_scan_minutes = 1;

        let report = f.indexer.sync_full(&profile, 100, 10, Utc::now()).await;
        assert!(report.success);
        assert_eq!(report.stop_reason, StopReason::TimeBudget);
        // one page per second of virtual time
        assert!((59..=61).contains(&report.pages_scanned));
        assert_eq!(report.records_written, report.records_found);
    }

    #[tokio::test]
    async fn test_unregistered_site_reports_not_configured() {
        let f = fixture(StaticSiteClient::new());
        let report = f
            .indexer
            .sync_incremental(&IntelSiteProfile::new("ttg"), 5, Utc::now())
            .await;
        assert_eq!(report.stop_reason, StopReason::NotConfigured);
        assert_eq!(report.pages_scanned, 0);
    }
}
