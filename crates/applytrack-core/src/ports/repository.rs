//! ApplicationRepository port - リモート永続化（正本）
//!
//! リモートのリレーショナルストアが source of truth です。
//! StageStore はその楽観的なローカルコピーに過ぎません。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ApplicationPatch, ApplicationRecord, RecordId, RepositoryError, Stage, UserId};

/// Filter passed to [`ApplicationRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    pub user: Option<UserId>,

    /// Restrict to these stages (empty = all stages).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
}

impl ApplicationFilter {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            stages: Vec::new(),
        }
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        if let Some(user) = self.user
            && record.user_id != user
        {
            return false;
        }
        self.stages.is_empty() || self.stages.contains(&record.stage)
    }
}

/// ApplicationRepository は job application の CRUD を提供
///
/// # 設計原則
/// - 失敗は `RepositoryError` で返す（retry は実装側の責務）
/// - `bulk_update` は id ごとの結果を返す
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn list(&self, filter: &ApplicationFilter)
    -> Result<Vec<ApplicationRecord>, RepositoryError>;

    async fn update(
        &self,
        id: RecordId,
        patch: &ApplicationPatch,
    ) -> Result<ApplicationRecord, RepositoryError>;

    async fn bulk_update(
        &self,
        ids: &[RecordId],
        patch: &ApplicationPatch,
    ) -> Vec<Result<ApplicationRecord, RepositoryError>>;

    async fn delete(&self, ids: &[RecordId]) -> Result<(), RepositoryError>;
}
