//! HR state store: write-through cache over [`HrCasesRepository`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{DisappearSemantics, HrKey, HrStatus, LifeStatus, TorrentHrRecord};
use crate::storage::HrCasesRepository;

/// One [`TorrentHrRecord`] per (site, torrent).
///
/// The cache fills lazily from the repository on a miss. Every mutation is a
/// read-modify-write under the cache lock and reaches the repository before
/// it returns.
pub struct HrStateStore {
    repo: Arc<dyn HrCasesRepository>,
    cache: Mutex<HashMap<HrKey, TorrentHrRecord>>,
}

impl HrStateStore {
    pub fn new(repo: Arc<dyn HrCasesRepository>) -> Self {
        Self {
            repo,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, site: &str, torrent_id: &str) -> Result<Option<TorrentHrRecord>> {
        let mut cache = self.cache.lock().await;
        self.load(&mut cache, &HrKey::new(site, torrent_id)).await
    }

    pub async fn upsert(&self, record: TorrentHrRecord) -> Result<TorrentHrRecord> {
        let mut cache = self.cache.lock().await;
        self.repo.upsert(&record).await?;
        cache.insert(record.key(), record.clone());
        Ok(record)
    }

    /// All records of the site, refreshed into the cache.
    pub async fn list_active_for_site(&self, site: &str) -> Result<Vec<TorrentHrRecord>> {
        let mut cache = self.cache.lock().await;
        let records = self.repo.list_active_for_site(site).await?;
        for record in &records {
            cache.insert(record.key(), record.clone());
        }
        Ok(records)
    }

    /// Apply one HR page row. A FAILED record keeps its status.
    pub async fn update_from_hr_page(
        &self,
        site: &str,
        torrent_id: &str,
        required_seed_hours: Option<f64>,
        seeded_hours: Option<f64>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<TorrentHrRecord> {
        self.mutate(site, torrent_id, |record| {
            if record.hr_status != HrStatus::Failed {
                record.hr_status = HrStatus::Active;
            }
            if required_seed_hours.is_some() {
                record.required_seed_hours = required_seed_hours;
            }
            if let Some(seeded) = seeded_hours {
                record.seeded_hours = seeded;
            }
            if deadline.is_some() {
                record.deadline = deadline;
            }
            record.first_seen_at.get_or_insert(now);
            record.last_seen_at = Some(now);
        })
        .await
    }

    /// The torrent fell off the HR page.
    pub async fn mark_disappeared(
        &self,
        site: &str,
        torrent_id: &str,
        semantics: DisappearSemantics,
        now: DateTime<Utc>,
    ) -> Result<TorrentHrRecord> {
        self.mutate(site, torrent_id, |record| {
            record.hr_status = semantics.status();
            record.last_seen_at = Some(now);
        })
        .await
    }

    /// The site reported an HR penalty for the torrent.
    pub async fn mark_penalized(
        &self,
        site: &str,
        torrent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TorrentHrRecord> {
        self.mutate(site, torrent_id, |record| {
            record.hr_status = HrStatus::Failed;
            record.last_seen_at = Some(now);
        })
        .await
    }

    /// The site deleted the torrent.
    pub async fn mark_deleted(
        &self,
        site: &str,
        torrent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TorrentHrRecord> {
        self.mutate(site, torrent_id, |record| {
            record.life_status = LifeStatus::Deleted;
            record.last_seen_at = Some(now);
        })
        .await
    }

    /// Get-or-create, apply `change`, write through.
    async fn mutate<F>(&self, site: &str, torrent_id: &str, change: F) -> Result<TorrentHrRecord>
    where
        F: FnOnce(&mut TorrentHrRecord),
    {
        let key = HrKey::new(site, torrent_id);
        let mut cache = self.cache.lock().await;
        let mut record = self
            .load(&mut cache, &key)
            .await?
            .unwrap_or_else(|| TorrentHrRecord::new(site, torrent_id));

        change(&mut record);

        self.repo.upsert(&record).await?;
        cache.insert(key, record.clone());
        Ok(record)
    }

    async fn load(
        &self,
        cache: &mut HashMap<HrKey, TorrentHrRecord>,
        key: &HrKey,
    ) -> Result<Option<TorrentHrRecord>> {
        if let Some(record) = cache.get(key) {
            return Ok(Some(record.clone()));
        }
        let loaded = self.repo.get(&key.site, &key.torrent_id).await?;
        if let Some(record) = &loaded {
            cache.insert(key.clone(), record.clone());
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use chrono::Duration;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> (HrStateStore, Arc<LocalStorage>) {
        let repo = Arc::new(LocalStorage::new(tmp.path()));
        (HrStateStore::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_update_from_hr_page_creates_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (store, repo) = store(&tmp);
        let now = Utc::now();

        let first = store
            .update_from_hr_page("s", "1", Some(72.0), Some(10.0), None, now)
            .await
            .unwrap();
        let second = store
            .update_from_hr_page("s", "1", Some(72.0), Some(10.0), None, now)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hr_status, HrStatus::Active);
        assert_eq!(first.first_seen_at, Some(now));

        // Written through to the repository.
        let persisted = repo.get("s", "1").await.unwrap().unwrap();
        assert_eq!(persisted, second);
    }

    #[tokio::test]
    async fn test_first_seen_is_kept_and_missing_fields_preserved() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(1);

        store
            .update_from_hr_page("s", "1", Some(72.0), Some(10.0), Some(t1), t0)
            .await
            .unwrap();
        let record = store
            .update_from_hr_page("s", "1", None, Some(11.0), None, t1)
            .await
            .unwrap();

        assert_eq!(record.first_seen_at, Some(t0));
        assert_eq!(record.last_seen_at, Some(t1));
        assert_eq!(record.required_seed_hours, Some(72.0));
        assert_eq!(record.seeded_hours, 11.0);
        assert_eq!(record.deadline, Some(t1));
    }

    #[tokio::test]
    async fn test_penalized_record_stays_failed() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let now = Utc::now();

        store.mark_penalized("s", "1", now).await.unwrap();
        let record = store
            .update_from_hr_page("s", "1", Some(72.0), Some(1.0), None, now)
            .await
            .unwrap();
        assert_eq!(record.hr_status, HrStatus::Failed);
    }

    #[tokio::test]
    async fn test_disappear_and_delete() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let now = Utc::now();

        store
            .update_from_hr_page("s", "1", Some(72.0), None, None, now)
            .await
            .unwrap();
        let record = store
            .mark_disappeared("s", "1", DisappearSemantics::Finished, now)
            .await
            .unwrap();
        assert_eq!(record.hr_status, HrStatus::Finished);

        let record = store.mark_deleted("s", "1", now).await.unwrap();
        assert_eq!(record.life_status, LifeStatus::Deleted);
        assert_eq!(record.hr_status, HrStatus::Finished);

        // Deleting an unknown torrent creates its record.
        let record = store.mark_deleted("s", "404", now).await.unwrap();
        assert_eq!(record.hr_status, HrStatus::None);
        assert_eq!(record.life_status, LifeStatus::Deleted);
    }

    #[tokio::test]
    async fn test_deleted_record_never_comes_back_alive() {
        let tmp = TempDir::new().unwrap();
        let (store, repo) = store(&tmp);
        let t0 = Utc::now();

        store
            .update_from_hr_page("s", "1", Some(72.0), Some(5.0), None, t0)
            .await
            .unwrap();
        store.mark_deleted("s", "1", t0).await.unwrap();
        store
            .mark_disappeared("s", "1", DisappearSemantics::Unknown, t0)
            .await
            .unwrap();

        for hours in 1..=3u32 {
            let record = store
                .update_from_hr_page(
                    "s",
                    "1",
                    Some(72.0),
                    Some(5.0 + f64::from(hours)),
                    None,
                    t0 + Duration::hours(hours.into()),
                )
                .await
                .unwrap();
            assert_eq!(record.life_status, LifeStatus::Deleted);
            assert_eq!(record.hr_status, HrStatus::Active);
        }

        let persisted = repo.get("s", "1").await.unwrap().unwrap();
        assert_eq!(persisted.life_status, LifeStatus::Deleted);
        assert_eq!(persisted.seeded_hours, 8.0);
    }

    #[tokio::test]
    async fn test_cache_fills_from_repository() {
        let tmp = TempDir::new().unwrap();
        let repo = Arc::new(LocalStorage::new(tmp.path()));
        let mut record = TorrentHrRecord::new("s", "7");
        record.hr_status = HrStatus::Active;
        repo.upsert(&record).await.unwrap();

        let store = HrStateStore::new(repo);
        assert_eq!(store.get("s", "7").await.unwrap(), Some(record));
        assert_eq!(store.list_active_for_site("s").await.unwrap().len(), 1);
        assert!(store.get("s", "8").await.unwrap().is_none());
    }
}
