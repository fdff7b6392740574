//! Session: the per-user instance tying store, coordinator, bus and caches
//! together. Lifecycle follows sign-in / sign-out instead of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::info;

use super::config::TrackerConfig;
use super::status::{NamedCacheStats, SessionStatus};
use crate::analytics::{AnalyticsReport, AnalyticsService};
use crate::cache::{InvalidationBus, Subscription};
use crate::domain::{RecordId, Stage, TrackerError, UserId};
use crate::impls::{ChangeFeedPump, PumpReport};
use crate::pipeline::{Board, PipelineStats, StageStore, TransactionCoordinator, TxOutcome};
use crate::ports::{ApplicationFilter, ApplicationRepository, ChangeNotification, Clock};
use crate::profile::ProfileCache;
use crate::schedule::ScheduleBook;

pub struct Session {
    pub(super) user: UserId,
    pub(super) config: TrackerConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) store: Arc<StageStore>,
    pub(super) coordinator: TransactionCoordinator,
    pub(super) bus: Arc<InvalidationBus>,
    pub(super) repository: Arc<dyn ApplicationRepository>,
    pub(super) analytics: AnalyticsService,
    pub(super) profile: Arc<ProfileCache>,
    pub(super) schedule: ScheduleBook,
    pub(super) feed: Option<(mpsc::Sender<ChangeNotification>, ChangeFeedPump)>,
    /// Set when the change feed reports application rows changed remotely.
    pub(super) needs_refresh: Arc<AtomicBool>,
    pub(super) refresh_hint: Option<Subscription>,
}

impl Session {
    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<StageStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn bus(&self) -> &Arc<InvalidationBus> {
        &self.bus
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    pub fn profile(&self) -> &Arc<ProfileCache> {
        &self.profile
    }

    pub fn schedule(&self) -> &ScheduleBook {
        &self.schedule
    }

    /// Sender for the transport adapter, when the change feed is enabled.
    pub fn change_feed(&self) -> Option<mpsc::Sender<ChangeNotification>> {
        self.feed.as_ref().map(|(tx, _)| tx.clone())
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh.load(Ordering::SeqCst)
    }

    /// Resynchronize the stage store from the repository.
    ///
    /// Wins over any in-flight optimistic mutation: its eventual rollback
    /// is discarded.
    pub async fn refresh(&self) -> Result<usize, TrackerError> {
        let records = self
            .repository
            .list(&ApplicationFilter::for_user(self.user))
            .await?;
        let count = records.len();
        self.store.replace_all(records);
        self.needs_refresh.store(false, Ordering::SeqCst);
        info!(user = %self.user, records = count, "session refreshed");
        Ok(count)
    }

    pub async fn move_record(&self, id: RecordId, stage: Stage) -> Result<TxOutcome, TrackerError> {
        self.coordinator.move_record(id, stage).await
    }

    pub async fn bulk_move(&self, ids: &[RecordId], stage: Stage) -> Result<TxOutcome, TrackerError> {
        self.coordinator.bulk_move(ids, stage).await
    }

    pub async fn delete_records(&self, ids: &[RecordId]) -> Result<TxOutcome, TrackerError> {
        self.coordinator.delete_records(ids).await
    }

    pub fn board(&self) -> Board {
        self.store.board()
    }

    pub fn stats(&self) -> PipelineStats {
        self.store.stats()
    }

    pub fn pipeline_report(&self) -> AnalyticsReport {
        self.analytics.pipeline_report()
    }

    pub fn status(&self) -> SessionStatus {
        let mut caches = vec![
            NamedCacheStats::of(self.analytics.cache().as_ref()),
            NamedCacheStats::of(self.profile.store().as_ref()),
        ];
        caches.extend(
            self.schedule
                .caches()
                .iter()
                .map(|cache| NamedCacheStats::of(cache.as_ref())),
        );
        SessionStatus {
            user: self.user,
            records: self.store.len(),
            revision: self.store.revision(),
            generation: self.store.generation(),
            in_flight: self.coordinator.in_flight(),
            needs_refresh: self.needs_refresh(),
            listeners: self.bus.listener_count(),
            change_feed_running: self
                .feed
                .as_ref()
                .is_some_and(|(_, pump)| !pump.is_finished()),
            stats: self.store.stats(),
            caches,
        }
    }

    /// Sign-out: unsubscribe, clear every cache and stop the change feed.
    pub async fn end(mut self) -> Option<PumpReport> {
        if let Some(subscription) = self.refresh_hint.take() {
            subscription.unsubscribe();
        }
        self.bus.clear_all();
        let report = match self.feed.take() {
            Some((tx, pump)) => {
                drop(tx);
                Some(pump.shutdown_and_join().await)
            }
            None => None,
        };
        info!(user = %self.user, "session ended");
        report
    }
}
