//! ProfileSource port - プロフィール集約データの取得
//!
//! プロフィール・スキル・職歴・学歴を 1 回の fetch でまとめて返します。
//! 個別のビューは `profile::selectors` が snapshot から射影します。

use async_trait::async_trait;

use crate::domain::{RepositoryError, UserId};
use crate::profile::ProfileSnapshot;

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, user: UserId) -> Result<ProfileSnapshot, RepositoryError>;
}
