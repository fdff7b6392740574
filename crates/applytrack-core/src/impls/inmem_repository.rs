//! InMemoryApplicationRepository - 開発・テスト用の永続化コラボレータ
//!
//! # 学習ポイント
//! - 失敗注入（fail_next / fail_ids）で rollback 経路を再現する
//! - 任意の遅延で「remote 呼び出し中」の状態を観測できる

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{ApplicationPatch, ApplicationRecord, RecordId, RepositoryError};
use crate::ports::{ApplicationFilter, ApplicationRepository};

#[derive(Default)]
struct Failures {
    /// Consumed one per call, whatever the call is.
    next: VecDeque<RepositoryError>,
    /// Sticky per-record failures.
    ids: HashMap<RecordId, RepositoryError>,
}

/// In-memory stand-in for the remote store.
///
/// `list` returns records ordered by `created_at`, then id.
#[derive(Default)]
pub struct InMemoryApplicationRepository {
    records: Mutex<HashMap<RecordId, ApplicationRecord>>,
    failures: Mutex<Failures>,
    latency: Option<Duration>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ApplicationRecord>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.insert(record);
        }
        repo
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, record: ApplicationRecord) {
        self.records.lock().insert(record.id, record);
    }

    pub fn get(&self, id: RecordId) -> Option<ApplicationRecord> {
        self.records.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail the next call with `err`.
    pub fn fail_next(&self, err: RepositoryError) {
        self.failures.lock().next.push_back(err);
    }

    /// Fail every call touching one of `ids` until cleared.
    pub fn fail_ids(&self, ids: &[RecordId], err: RepositoryError) {
        let mut failures = self.failures.lock();
        for id in ids {
            failures.ids.insert(*id, err.clone());
        }
    }

    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    async fn enter(&self) -> Result<(), RepositoryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().next.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn failure_for(&self, id: RecordId) -> Option<RepositoryError> {
        self.failures.lock().ids.get(&id).cloned()
    }

    fn update_one(&self, id: RecordId, patch: &ApplicationPatch) -> Result<ApplicationRecord, RepositoryError> {
        if let Some(err) = self.failure_for(id) {
            return Err(err);
        }
        let mut records = self.records.lock();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::Rejected(format!("no such record: {id}")))?;
        patch.apply_to(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.enter().await?;
        let mut records: Vec<ApplicationRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn update(
        &self,
        id: RecordId,
        patch: &ApplicationPatch,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.enter().await?;
        self.update_one(id, patch)
    }

    async fn bulk_update(
        &self,
        ids: &[RecordId],
        patch: &ApplicationPatch,
    ) -> Vec<Result<ApplicationRecord, RepositoryError>> {
        if let Err(err) = self.enter().await {
            return ids.iter().map(|_| Err(err.clone())).collect();
        }
        ids.iter().map(|id| self.update_one(*id, patch)).collect()
    }

    async fn delete(&self, ids: &[RecordId]) -> Result<(), RepositoryError> {
        self.enter().await?;
        if let Some(err) = ids.iter().find_map(|id| self.failure_for(*id)) {
            return Err(err);
        }
        let mut records = self.records.lock();
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}
