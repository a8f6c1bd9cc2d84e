// src/pipeline/sync.rs

//! Catalogue sync pipeline.

use chrono::{DateTime, Utc};

use crate::engine::IntelEngine;
use crate::models::IntelSiteProfile;
use crate::services::{SyncMode, SyncReport};

/// Sync the catalogue of each profile in turn.
///
/// Sites are scanned one after another so inter-page delays are never
/// stacked on top of another site's scan from the same host.
pub async fn run_index_sync(
    engine: &IntelEngine,
    profiles: &[IntelSiteProfile],
    mode: SyncMode,
    max_pages: Option<u32>,
    now: DateTime<Utc>,
) -> Vec<SyncReport> {
    let mut reports = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let report = engine.sync_index(profile, mode, max_pages, now).await;
        if !report.success {
            log::warn!(
                "[{}] index sync finished with {} errors",
                report.site,
                report.errors.len()
            );
        }
        reports.push(report);
    }

    let written: usize = reports.iter().map(|r| r.records_written).sum();
    log::info!(
        "Index sync complete: {} sites, {} records written",
        reports.len(),
        written
    );
    reports
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::HttpClientRegistry;
    use crate::client::testing::StaticSiteClient;
    use crate::engine::Repositories;
    use crate::models::{Config, TorrentSearchParams};
    use crate::parsers::ParserRegistry;
    use crate::services::StopReason;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    const LISTING: &str = r#"<table>
<tr><th>Type</th><th>Torrent</th><th>Size</th><th>Seeders</th></tr>
<tr><td>TV</td><td><a href="details.php?id=11">Show.S01</a></td><td>700 MB</td><td>4</td></tr>
<tr><td>TV</td><td><a href="details.php?id=12">Show.S02</a></td><td>800 MB</td><td>9</td></tr>
</table>"#;

    #[tokio::test(start_paused = true)]
    async fn test_reports_per_site_and_entries_searchable() {
        let tmp = TempDir::new().unwrap();
        let clients = Arc::new(HttpClientRegistry::new());
        clients.register(
            "hdsky",
            Arc::new(
                StaticSiteClient::new()
                    .page("browse.php?page=1", LISTING)
                    .page("browse.php?page=2", "<p>nothing here</p>"),
            ),
        );
        let engine = IntelEngine::new(
            &Config::default(),
            Repositories::local(Arc::new(LocalStorage::new(tmp.path()))),
            clients,
            ParserRegistry::default(),
        );
        let profiles = vec![IntelSiteProfile::new("hdsky"), IntelSiteProfile::new("ttg")];

        let reports =
            run_index_sync(&engine, &profiles, SyncMode::Incremental, None, Utc::now()).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].records_written, 2);
        assert_eq!(reports[0].stop_reason, StopReason::EndOfListing);
        assert_eq!(reports[1].stop_reason, StopReason::NotConfigured);

        let hits = engine
            .search(&TorrentSearchParams {
                keyword: Some("show".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].seeders, 9);
    }
}
