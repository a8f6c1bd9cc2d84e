// src/pipeline/refresh.rs

//! Multi-site refresh pipeline.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::engine::IntelEngine;
use crate::models::{Action, IntelSiteProfile};

/// Actions produced for one site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRefreshOutcome {
    pub site: String,
    pub actions: Vec<Action>,
}

/// Refresh every profile, at most `concurrency` sites at a time.
///
/// Outcomes come back in completion order; a failing site never stops the
/// others since failures are already folded into its actions.
pub async fn run_refresh(
    engine: &IntelEngine,
    profiles: &[IntelSiteProfile],
    concurrency: usize,
    now: DateTime<Utc>,
) -> Vec<SiteRefreshOutcome> {
    log::info!(
        "Refreshing {} sites (concurrency {})",
        profiles.len(),
        concurrency
    );

    let outcomes: Vec<SiteRefreshOutcome> = stream::iter(profiles)
        .map(|profile| async move {
            let actions = engine.refresh_site(profile, now).await;
            log::info!("[{}] {} actions", profile.site, actions.len());
            SiteRefreshOutcome {
                site: profile.site.clone(),
                actions,
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let total: usize = outcomes.iter().map(|o| o.actions.len()).sum();
    log::info!("Refresh complete: {} actions across {} sites", total, outcomes.len());
    outcomes
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::HttpClientRegistry;
    use crate::client::testing::StaticSiteClient;
    use crate::engine::Repositories;
    use crate::models::{ActionType, Config};
    use crate::parsers::ParserRegistry;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failing_site_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        let clients = Arc::new(HttpClientRegistry::new());
        clients.register(
            "good",
            Arc::new(StaticSiteClient::new().page(
                "hr.php",
                "<table><tr><th>ID</th><th>Required</th><th>Seeded</th></tr>\
                 <tr><td>7</td><td>72</td><td>80</td></tr></table>",
            )),
        );
        clients.register("bad", Arc::new(StaticSiteClient::new()));
        let engine = IntelEngine::new(
            &Config::default(),
            Repositories::local(Arc::new(LocalStorage::new(tmp.path()))),
            clients,
            ParserRegistry::default(),
        );

        let profiles: Vec<IntelSiteProfile> = ["good", "bad", "idle"]
            .into_iter()
            .map(|site| {
                let mut profile = IntelSiteProfile::new(site);
                profile.hr.enabled = true;
                profile
            })
            .collect();

        let mut outcomes = run_refresh(&engine, &profiles, 2, Utc::now()).await;
        outcomes.sort_by(|a, b| a.site.cmp(&b.site));
        assert_eq!(outcomes.len(), 3);

        let bad = &outcomes[0];
        assert_eq!(bad.actions.len(), 1);
        assert_eq!(bad.actions[0].action_type, ActionType::LogOnly);

        let good = &outcomes[1];
        assert_eq!(good.actions[0].action_type, ActionType::HrRecordProgress);
        assert_eq!(good.actions[0].torrent_id.as_deref(), Some("7"));

        // No client registered: skipped quietly.
        assert!(outcomes[2].actions.is_empty());
    }
}
