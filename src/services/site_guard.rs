//! Site Guard: scan budgets and adaptive backoff learned from blocks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    IntelSiteProfile, NewBlockEvent, ScanBudget, SiteGuardEvent, SiteThrottleProfile,
};
use crate::storage::SiteGuardRepository;
use crate::utils::sync::SiteLocks;

/// Share of the throughput that triggered a block which is considered safe.
const SAFETY_FACTOR: f64 = 0.6;
const MIN_SAFE_SCAN_MINUTES: u32 = 1;
const MIN_SAFE_PAGES_PER_HOUR: u32 = 10;

pub struct SiteGuard {
    repo: Arc<dyn SiteGuardRepository>,
    locks: SiteLocks,
}

impl SiteGuard {
    pub fn new(repo: Arc<dyn SiteGuardRepository>) -> Self {
        Self {
            repo,
            locks: SiteLocks::new(),
        }
    }

    /// Allowance for a scan starting at `now`. Zero while inside a block
    /// window, whether or not the guard is enabled for the site; a disabled
    /// guard otherwise hands out the configured defaults.
    pub async fn get_scan_budget(
        &self,
        profile: &IntelSiteProfile,
        now: DateTime<Utc>,
    ) -> Result<ScanBudget> {
        let config = &profile.site_guard;
        let _guard = self.locks.acquire(&profile.site).await;

        if !config.enabled {
            let stored = self.repo.get_profile(&profile.site).await?;
            if let Some(throttle) = stored.filter(|t| t.in_block_window(now)) {
                return Ok(ScanBudget::blocked(
                    throttle.last_block_cause,
                    throttle.last_block_end,
                ));
            }
            return Ok(ScanBudget::allowed(
                config.default_safe_scan_minutes,
                config.default_safe_pages_per_hour,
            ));
        }

        let throttle = self.load_or_seed(profile).await?;
        if throttle.in_block_window(now) {
            return Ok(ScanBudget::blocked(
                throttle.last_block_cause.clone(),
                throttle.last_block_end,
            ));
        }
        Ok(ScanBudget::allowed(
            throttle.safe_scan_minutes,
            throttle.safe_pages_per_hour,
        ))
    }

    /// Record an observed block and ratchet the safe rates down.
    ///
    /// With the scan's minute counter, `safe_scan_minutes` becomes
    /// `max(1, 0.6 × minutes)`; with pages as well, `safe_pages_per_hour`
    /// becomes `max(10, 0.6 × pages per hour)`. Neither rate ever increases.
    pub async fn record_block_event(
        &self,
        profile: &IntelSiteProfile,
        block_until: DateTime<Utc>,
        cause: &str,
        scan_minutes_before_block: Option<u32>,
        scan_pages_before_block: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<SiteGuardEvent> {
        let _guard = self.locks.acquire(&profile.site).await;
        let mut throttle = self.load_or_seed(profile).await?;

        throttle.last_block_start = Some(now);
        throttle.last_block_end = Some(block_until);
        throttle.last_block_cause = Some(cause.to_string());

        if let Some(minutes) = scan_minutes_before_block {
            let learned = ((SAFETY_FACTOR * f64::from(minutes)) as u32).max(MIN_SAFE_SCAN_MINUTES);
            throttle.safe_scan_minutes = throttle.safe_scan_minutes.min(learned);
            throttle.last_full_scan_minutes = Some(minutes);

            if let Some(pages) = scan_pages_before_block {
                throttle.last_full_scan_pages = Some(pages);
                if minutes > 0 {
                    let pages_per_hour = f64::from(pages) * 60.0 / f64::from(minutes);
                    let learned =
                        ((SAFETY_FACTOR * pages_per_hour) as u32).max(MIN_SAFE_PAGES_PER_HOUR);
                    throttle.safe_pages_per_hour = throttle.safe_pages_per_hour.min(learned);
                }
            }
        } else if let Some(pages) = scan_pages_before_block {
            throttle.last_full_scan_pages = Some(pages);
        }
        throttle.updated_at = Some(now);

        self.repo.save_profile(&throttle).await?;
        let event = self
            .repo
            .record_block_event(NewBlockEvent {
                site: profile.site.clone(),
                block_until,
                cause: cause.to_string(),
                scan_minutes_before_block,
                scan_pages_before_block,
                created_at: now,
            })
            .await?;

        log::warn!(
            "[{}] blocked until {} ({}); safe rates now {} min / {} pages/h",
            profile.site,
            block_until,
            cause,
            throttle.safe_scan_minutes,
            throttle.safe_pages_per_hour
        );
        Ok(event)
    }

    /// Stored throttle state, if the site has one yet.
    pub async fn get_profile(&self, site: &str) -> Result<Option<SiteThrottleProfile>> {
        self.repo.get_profile(site).await
    }

    pub async fn get_latest_block(&self, site: &str) -> Result<Option<SiteGuardEvent>> {
        self.repo.get_latest_block(site).await
    }

    /// Stored profile, or a new one seeded from the site's configured defaults.
    async fn load_or_seed(&self, profile: &IntelSiteProfile) -> Result<SiteThrottleProfile> {
        if let Some(existing) = self.repo.get_profile(&profile.site).await? {
            return Ok(existing);
        }
        let seeded = SiteThrottleProfile::with_defaults(
            &profile.site,
            profile.site_guard.default_safe_scan_minutes,
            profile.site_guard.default_safe_pages_per_hour,
        );
        self.repo.save_profile(&seeded).await?;
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use chrono::Duration;
    use tempfile::TempDir;

    fn guard(tmp: &TempDir) -> SiteGuard {
        SiteGuard::new(Arc::new(LocalStorage::new(tmp.path())))
    }

    #[tokio::test]
    async fn test_budget_seeded_from_profile_defaults() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let mut profile = IntelSiteProfile::new("hdsky");
        profile.site_guard.default_safe_scan_minutes = 15;
        profile.site_guard.default_safe_pages_per_hour = 120;

        let budget = guard.get_scan_budget(&profile, Utc::now()).await.unwrap();
        assert_eq!(budget, ScanBudget::allowed(15, 120));
        assert!(guard.get_profile("hdsky").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_block_window_zeroes_budget() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let profile = IntelSiteProfile::new("hdsky");
        let now = Utc::now();
        let until = now + Duration::hours(2);

        guard
            .record_block_event(&profile, until, "http_429", None, None, now)
            .await
            .unwrap();

        let budget = guard.get_scan_budget(&profile, now).await.unwrap();
        assert!(budget.blocked);
        assert_eq!((budget.max_minutes, budget.max_pages), (0, 0));
        assert_eq!(budget.until, Some(until));
        assert_eq!(budget.reason.as_deref(), Some("http_429"));

        // Window over: rates untouched because no counters were supplied.
        let later = guard.get_scan_budget(&profile, until).await.unwrap();
        assert_eq!(later, ScanBudget::allowed(10, 200));
    }

    #[tokio::test]
    async fn test_ratchet_is_monotonic() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let profile = IntelSiteProfile::new("hdsky");
        let now = Utc::now();

        // 60 pages in 20 minutes = 180 pages/h -> 108; 0.6 * 20 = 12 -> min(10, 12) = 10.
        guard
            .record_block_event(&profile, now, "ban", Some(20), Some(60), now)
            .await
            .unwrap();
        let throttle = guard.get_profile("hdsky").await.unwrap().unwrap();
        assert_eq!(throttle.safe_scan_minutes, 10);
        assert_eq!(throttle.safe_pages_per_hour, 108);
        assert_eq!(throttle.last_full_scan_minutes, Some(20));
        assert_eq!(throttle.last_full_scan_pages, Some(60));

        // A slower block tightens further.
        guard
            .record_block_event(&profile, now, "ban", Some(5), Some(10), now)
            .await
            .unwrap();
        let throttle = guard.get_profile("hdsky").await.unwrap().unwrap();
        assert_eq!(throttle.safe_scan_minutes, 3);
        assert_eq!(throttle.safe_pages_per_hour, 72);

        // A faster block never loosens.
        guard
            .record_block_event(&profile, now, "ban", Some(600), Some(100_000), now)
            .await
            .unwrap();
        let throttle = guard.get_profile("hdsky").await.unwrap().unwrap();
        assert_eq!(throttle.safe_scan_minutes, 3);
        assert_eq!(throttle.safe_pages_per_hour, 72);
    }

    #[tokio::test]
    async fn test_floors_apply() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let profile = IntelSiteProfile::new("hdsky");
        let now = Utc::now();

        guard
            .record_block_event(&profile, now, "ban", Some(1), Some(1), now)
            .await
            .unwrap();
        let throttle = guard.get_profile("hdsky").await.unwrap().unwrap();
        assert_eq!(throttle.safe_scan_minutes, 1);
        assert_eq!(throttle.safe_pages_per_hour, 36);

        guard
            .record_block_event(&profile, now, "ban", Some(0), Some(0), now)
            .await
            .unwrap();
        let throttle = guard.get_profile("hdsky").await.unwrap().unwrap();
        assert_eq!(throttle.safe_scan_minutes, 1);
        assert_eq!(throttle.safe_pages_per_hour, 36);
    }

    #[tokio::test]
    async fn test_event_log_and_disabled_guard() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let mut profile = IntelSiteProfile::new("hdsky");
        let now = Utc::now();

        let event = guard
            .record_block_event(&profile, now + Duration::hours(12), "pm", None, None, now)
            .await
            .unwrap();
        assert_eq!(
            guard.get_latest_block("hdsky").await.unwrap(),
            Some(event)
        );

        profile.site_guard.enabled = false;
        let budget = guard.get_scan_budget(&profile, now).await.unwrap();
        assert!(budget.blocked);
        assert_eq!((budget.max_minutes, budget.max_pages), (0, 0));

        let later = now + Duration::hours(13);
        let budget = guard.get_scan_budget(&profile, later).await.unwrap();
        assert!(!budget.blocked);
        assert_eq!((budget.max_minutes, budget.max_pages), (10, 200));
    }

    #[tokio::test]
    async fn test_disabled_guard_without_state_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let guard = guard(&tmp);
        let mut profile = IntelSiteProfile::new("ttg");
        profile.site_guard.enabled = false;
        profile.site_guard.default_safe_pages_per_hour = 50;

        let budget = guard.get_scan_budget(&profile, Utc::now()).await.unwrap();
        assert!(!budget.blocked);
        assert_eq!(budget.max_pages, 50);
        assert!(guard.get_profile("ttg").await.unwrap().is_none());
    }
}
