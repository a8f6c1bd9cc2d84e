//! HR watcher: reconciles a site's HR page against the state store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::HttpClientRegistry;
use crate::error::Result;
use crate::models::{HrStatus, IntelSiteProfile};
use crate::parsers::ParserRegistry;
use crate::services::HrStateStore;

/// Outcome of one HR page refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HrRefresh {
    pub rows_seen: usize,
    pub disappeared: usize,
}

pub struct HrWatcher {
    clients: Arc<HttpClientRegistry>,
    parsers: Arc<ParserRegistry>,
    store: Arc<HrStateStore>,
}

impl HrWatcher {
    pub fn new(
        clients: Arc<HttpClientRegistry>,
        parsers: Arc<ParserRegistry>,
        store: Arc<HrStateStore>,
    ) -> Self {
        Self {
            clients,
            parsers,
            store,
        }
    }

    /// Fetch and apply the HR page of one site.
    ///
    /// Every listed torrent is upserted as ACTIVE; alive ACTIVE records missing
    /// from the page are marked with the site's disappearance semantics. HTTP
    /// failures are returned to the caller.
    pub async fn refresh_site(
        &self,
        profile: &IntelSiteProfile,
        now: DateTime<Utc>,
    ) -> Result<HrRefresh> {
        let site = profile.site.as_str();
        if !profile.hr.enabled {
            log::debug!("[{}] HR tracking disabled", site);
            return Ok(HrRefresh::default());
        }
        let Some(client) = self.clients.get(site) else {
            log::debug!("[{}] no HTTP client registered, skipping HR refresh", site);
            return Ok(HrRefresh::default());
        };

        let html = client.fetch_hr_page(profile).await?;
        let page = self.parsers.parse_hr(profile, &html);
        if !page.recognized {
            log::warn!("[{}] HR page not recognised, leaving records untouched", site);
            return Ok(HrRefresh::default());
        }

        let mut seen = HashSet::new();
        for row in &page.rows {
            self.store
                .update_from_hr_page(
                    site,
                    &row.torrent_id,
                    row.required_seed_hours,
                    row.seeded_hours,
                    row.deadline,
                    now,
                )
                .await?;
            seen.insert(row.torrent_id.as_str());
        }

        let semantics = profile.hr.disappear_semantics;
        let mut disappeared = 0;
        for record in self.store.list_active_for_site(site).await? {
            if record.is_alive()
                && record.hr_status == HrStatus::Active
                && !seen.contains(record.torrent_id.as_str())
            {
                self.store
                    .mark_disappeared(site, &record.torrent_id, semantics, now)
                    .await?;
                disappeared += 1;
            }
        }

        log::info!(
            "[{}] HR refresh: {} rows, {} disappeared",
            site,
            page.rows.len(),
            disappeared
        );
        Ok(HrRefresh {
            rows_seen: page.rows.len(),
            disappeared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::StaticSiteClient;
    use crate::models::{DisappearSemantics, LifeStatus, TorrentHrRecord};
    use crate::storage::{HrCasesRepository, LocalStorage};
    use tempfile::TempDir;

    const HR_PAGE: &str = r#"<table>
<tr><th>Torrent</th><th>Required</th><th>Seeded</th><th>Deadline</th></tr>
<tr><td><a href="details.php?id=1">A</a></td><td>72</td><td>10</td><td>2026-05-01 00:00</td></tr>
<tr><td><a href="details.php?id=2">B</a></td><td>72</td><td>71</td><td>2026-05-02 00:00</td></tr>
</table>"#;

    struct Fixture {
        _tmp: TempDir,
        repo: Arc<LocalStorage>,
        clients: Arc<HttpClientRegistry>,
        watcher: HrWatcher,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let repo = Arc::new(LocalStorage::new(tmp.path()));
        let clients = Arc::new(HttpClientRegistry::new());
        let store = Arc::new(HrStateStore::new(repo.clone()));
        let watcher = HrWatcher::new(
            clients.clone(),
            Arc::new(ParserRegistry::default()),
            store,
        );
        Fixture {
            _tmp: tmp,
            repo,
            clients,
            watcher,
        }
    }

    fn profile(semantics: DisappearSemantics) -> IntelSiteProfile {
        let mut profile = IntelSiteProfile::new("hdsky");
        profile.hr.enabled = true;
        profile.hr.disappear_semantics = semantics;
        profile
    }

    async fn seed(repo: &LocalStorage, id: &str, status: HrStatus, life: LifeStatus) {
        let mut record = TorrentHrRecord::new("hdsky", id);
        record.hr_status = status;
        record.life_status = life;
        repo.upsert(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_site_is_not_fetched() {
        let f = fixture();
        let client = Arc::new(StaticSiteClient::new().page("hr.php", HR_PAGE));
        f.clients.register("hdsky", client.clone());

        let result = f
            .watcher
            .refresh_site(&IntelSiteProfile::new("hdsky"), Utc::now())
            .await
            .unwrap();
        assert_eq!(result, HrRefresh::default());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_is_a_no_op() {
        let f = fixture();
        let result = f
            .watcher
            .refresh_site(&profile(DisappearSemantics::Unknown), Utc::now())
            .await
            .unwrap();
        assert_eq!(result, HrRefresh::default());
    }

    #[tokio::test]
    async fn test_refresh_upserts_rows_and_marks_disappeared() {
        let f = fixture();
        f.clients.register(
            "hdsky",
            Arc::new(StaticSiteClient::new().page("hr.php", HR_PAGE)),
        );
        seed(&f.repo, "3", HrStatus::Active, LifeStatus::Alive).await;
        seed(&f.repo, "4", HrStatus::Active, LifeStatus::Deleted).await;
        seed(&f.repo, "5", HrStatus::Failed, LifeStatus::Alive).await;

        let result = f
            .watcher
            .refresh_site(&profile(DisappearSemantics::Finished), Utc::now())
            .await
            .unwrap();
        assert_eq!(result.rows_seen, 2);
        assert_eq!(result.disappeared, 1);

        let status = |id: &'static str| {
            let repo = f.repo.clone();
            async move { repo.get("hdsky", id).await.unwrap().unwrap().hr_status }
        };
        assert_eq!(status("1").await, HrStatus::Active);
        assert_eq!(status("2").await, HrStatus::Active);
        assert_eq!(status("3").await, HrStatus::Finished);
        assert_eq!(status("4").await, HrStatus::Active);
        assert_eq!(status("5").await, HrStatus::Failed);

        let record = f.repo.get("hdsky", "1").await.unwrap().unwrap();
        assert_eq!(record.required_seed_hours, Some(72.0));
        assert_eq!(record.seeded_hours, 10.0);
    }

    #[tokio::test]
    async fn test_deleted_torrent_listed_again_stays_deleted() {
        let f = fixture();
        f.clients.register(
            "hdsky",
            Arc::new(StaticSiteClient::new().page("hr.php", HR_PAGE)),
        );
        seed(&f.repo, "1", HrStatus::Finished, LifeStatus::Deleted).await;

        for _ in 0..2 {
            f.watcher
                .refresh_site(&profile(DisappearSemantics::Finished), Utc::now())
                .await
                .unwrap();
        }

        let record = f.repo.get("hdsky", "1").await.unwrap().unwrap();
        assert_eq!(record.life_status, LifeStatus::Deleted);
        assert_eq!(record.hr_status, HrStatus::Active);
        assert_eq!(record.required_seed_hours, Some(72.0));
    }

    #[tokio::test]
    async fn test_unknown_semantics_marks_unknown() {
        let f = fixture();
        f.clients.register(
            "hdsky",
            Arc::new(StaticSiteClient::new().page("hr.php", HR_PAGE)),
        );
        seed(&f.repo, "3", HrStatus::Active, LifeStatus::Alive).await;

        f.watcher
            .refresh_site(&profile(DisappearSemantics::Unknown), Utc::now())
            .await
            .unwrap();
        let record = f.repo.get("hdsky", "3").await.unwrap().unwrap();
        assert_eq!(record.hr_status, HrStatus::Unknown);
    }

    #[tokio::test]
    async fn test_unrecognised_page_keeps_records() {
        let f = fixture();
        f.clients.register(
            "hdsky",
            Arc::new(StaticSiteClient::new().page("hr.php", "<p>Please log in</p>")),
        );
        seed(&f.repo, "3", HrStatus::Active, LifeStatus::Alive).await;

        let result = f
            .watcher
            .refresh_site(&profile(DisappearSemantics::Finished), Utc::now())
            .await
            .unwrap();
        assert_eq!(result.disappeared, 0);
        let record = f.repo.get("hdsky", "3").await.unwrap().unwrap();
        assert_eq!(record.hr_status, HrStatus::Active);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let f = fixture();
        f.clients.register(
            "hdsky",
            Arc::new(StaticSiteClient::new().failing("hr.php")),
        );
        let result = f
            .watcher
            .refresh_site(&profile(DisappearSemantics::Finished), Utc::now())
            .await;
        assert!(result.is_err());
    }
}
