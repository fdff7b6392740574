//! SessionBuilder - セッションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 必須コラボレータの欠落は build() で検出
//! - セッションごとに 1 つの StageStore / CacheStore を明示的に共有（DI）

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use super::config::TrackerConfig;
use super::session::Session;
use crate::analytics::AnalyticsService;
use crate::cache::InvalidationBus;
use crate::domain::{SignalKind, UserId};
use crate::impls::{ChangeFeedPump, change_feed};
use crate::pipeline::{StageStore, TransactionCoordinator};
use crate::ports::{
    ApplicationRepository, Clock, IdGenerator, KeyValueStore, ProfileSource, SystemClock,
    UlidGenerator,
};
use crate::profile::{ProfileCache, ProfileFetcher};
use crate::schedule::ScheduleBook;

/// BuildError はセッション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    #[error("change feed requires a running tokio runtime")]
    NoRuntime,
}

/// SessionBuilder は 1 ユーザー分のセッションを構築
///
/// # 使用例
/// ```ignore
/// let session = SessionBuilder::new()
///     .user(user)
///     .repository(repo)
///     .profile_source(profiles)
///     .key_value_store(kv)
///     .with_change_feed()
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - user / repository / profile_source / key_value_store は必須
/// - clock と id generator は省略時 SystemClock / UlidGenerator
#[derive(Default)]
pub struct SessionBuilder {
    user: Option<UserId>,
    config: TrackerConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    repository: Option<Arc<dyn ApplicationRepository>>,
    profiles: Option<Arc<dyn ProfileSource>>,
    kv: Option<Arc<dyn KeyValueStore>>,
    change_feed: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn ApplicationRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn profile_source(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn key_value_store(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Spawn a change-feed pump; notifications are sent through
    /// [`Session::change_feed`].
    pub fn with_change_feed(mut self) -> Self {
        self.change_feed = true;
        self
    }

    pub fn build(self) -> Result<Session, BuildError> {
        let user = self.user.ok_or(BuildError::MissingDependency("user"))?;
        let repository = self
            .repository
            .ok_or(BuildError::MissingDependency("repository"))?;
        let profiles = self
            .profiles
            .ok_or(BuildError::MissingDependency("profile_source"))?;
        let kv = self
            .kv
            .ok_or(BuildError::MissingDependency("key_value_store"))?;
        if self.change_feed && tokio::runtime::Handle::try_current().is_err() {
            return Err(BuildError::NoRuntime);
        }

        let config = self.config;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let bus = Arc::new(InvalidationBus::new());
        let store = Arc::new(StageStore::new(Arc::clone(&clock)));
        let coordinator = TransactionCoordinator::new(
            user,
            Arc::clone(&store),
            Arc::clone(&repository),
            Arc::clone(&bus),
            Arc::clone(&ids),
        );

        let analytics = AnalyticsService::new(
            user,
            Arc::clone(&store),
            Arc::clone(&clock),
            config.analytics_ttl(),
            config.stale_after(),
        );
        bus.register(analytics.cache());

        let profile = Arc::new(ProfileCache::new(
            "profile",
            ProfileFetcher::new(profiles),
            config.profile_ttl(),
            Arc::clone(&clock),
        ));
        bus.register(profile.store());

        let schedule = ScheduleBook::new(
            user,
            kv,
            Arc::clone(&bus),
            ids,
            Arc::clone(&clock),
            config.schedule_ttl(),
        );
        for cache in schedule.caches() {
            bus.register(cache);
        }

        let needs_refresh = Arc::new(AtomicBool::new(false));
        let refresh_hint = {
            let flag = Arc::clone(&needs_refresh);
            bus.subscribe(SignalKind::ApplicationsChanged, move |_| {
                flag.store(true, Ordering::SeqCst);
            })
        };

        let feed = if self.change_feed {
            let (tx, rx) = change_feed::channel(config.change_feed_buffer);
            Some((tx, ChangeFeedPump::spawn(user, Arc::clone(&bus), rx)))
        } else {
            None
        };

        info!(user = %user, change_feed = feed.is_some(), "session started");
        Ok(Session {
            user,
            config,
            clock,
            store,
            coordinator,
            bus,
            repository,
            analytics,
            profile,
            schedule,
            feed,
            needs_refresh,
            refresh_hint: Some(refresh_hint),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryApplicationRepository, InMemoryKeyValueStore, InMemoryProfileSource};

    fn complete() -> SessionBuilder {
        SessionBuilder::new()
            .user(UserId::new(1))
            .repository(Arc::new(InMemoryApplicationRepository::new()))
            .profile_source(Arc::new(InMemoryProfileSource::new()))
            .key_value_store(Arc::new(InMemoryKeyValueStore::new()))
    }

    #[test]
    fn build_success() {
        assert!(complete().build().is_ok());
    }

    #[test]
    fn build_missing_repository() {
        let result = SessionBuilder::new()
            .user(UserId::new(1))
            .profile_source(Arc::new(InMemoryProfileSource::new()))
            .key_value_store(Arc::new(InMemoryKeyValueStore::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingDependency("repository"))));
    }

    #[test]
    fn build_missing_user() {
        let result = SessionBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingDependency("user"))));
    }

    #[test]
    fn change_feed_outside_runtime_is_rejected() {
        let result = complete().with_change_feed().build();
        assert!(matches!(result, Err(BuildError::NoRuntime)));
    }

    #[tokio::test]
    async fn change_feed_inside_runtime_is_spawned() {
        let session = complete().with_change_feed().build().unwrap();
        assert!(session.change_feed().is_some());
        assert!(session.end().await.is_some());
    }
}
