//! Transaction coordinator: optimistic mutation state machine.
//!
//! ```text
//! Idle ──begin──► Applying ──remote ok──► Confirmed   (snapshot dropped, signal published)
//!                    │
//!                    └──remote err──► RolledBack      (snapshot restored, error surfaced)
//! ```
//!
//! Design:
//! - Mutations take turns: at most one snapshot is unresolved at a time, so
//!   nothing but a refresh can shift a column between apply and rollback.
//! - `begin` applies locally and snapshots under the store's write lock;
//!   the caller reads its own write immediately.
//! - The remote call and the confirm/rollback run on a spawned task, so a
//!   caller that stops polling never strands a snapshot.
//! - [`PendingMutation`] restores on drop if it was never resolved; the
//!   rollback path is reachable even if the task panics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use super::store::{Mutation, RollbackSnapshot, StageStore};
use crate::cache::InvalidationBus;
use crate::domain::{
    ApplicationPatch, ApplicationRecord, RecordId, RepositoryError, Signal, Stage, TrackerError,
    TxId, UserId,
};
use crate::ports::{ApplicationRepository, IdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Idle,
    Applying,
    Confirmed,
    RolledBack,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed | TxState::RolledBack)
    }
}

/// Result of a confirmed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub tx_id: TxId,
    pub state: TxState,
    /// Records as they stand locally after the mutation (empty for deletes
    /// and no-ops).
    pub records: Vec<ApplicationRecord>,
    /// False when every target was already in place and the remote call
    /// was skipped.
    pub remote_called: bool,
}

type InFlight = Arc<Mutex<HashMap<RecordId, TxId>>>;

/// The only writer of the [`StageStore`] besides refresh.
///
/// Re-entrancy policy: a mutation touching a record that is already
/// `Applying` fails with [`TrackerError::Busy`]. A mutation on other
/// records waits for the pending one to resolve, in arrival order.
#[derive(Clone)]
pub struct TransactionCoordinator {
    user: UserId,
    store: Arc<StageStore>,
    repository: Arc<dyn ApplicationRepository>,
    bus: Arc<InvalidationBus>,
    ids: Arc<dyn IdGenerator>,
    in_flight: InFlight,
    /// Held from local apply until confirm/rollback.
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl TransactionCoordinator {
    pub fn new(
        user: UserId,
        store: Arc<StageStore>,
        repository: Arc<dyn ApplicationRepository>,
        bus: Arc<InvalidationBus>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            user,
            store,
            repository,
            bus,
            ids,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub async fn move_record(&self, id: RecordId, stage: Stage) -> Result<TxOutcome, TrackerError> {
        self.run(Mutation::Move {
            ids: vec![id],
            stage,
        })
        .await
    }

    pub async fn bulk_move(
        &self,
        ids: &[RecordId],
        stage: Stage,
    ) -> Result<TxOutcome, TrackerError> {
        self.run(Mutation::Move {
            ids: ids.to_vec(),
            stage,
        })
        .await
    }

    pub async fn delete_records(&self, ids: &[RecordId]) -> Result<TxOutcome, TrackerError> {
        self.run(Mutation::Delete { ids: ids.to_vec() }).await
    }

    pub fn is_applying(&self, id: RecordId) -> bool {
        self.in_flight.lock().contains_key(&id)
    }

    /// `Applying` while a mutation holds the record, `Idle` otherwise.
    pub fn state_of(&self, id: RecordId) -> TxState {
        if self.is_applying(id) {
            TxState::Applying
        } else {
            TxState::Idle
        }
    }

    /// Number of records currently held by an unresolved mutation.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn run(&self, mutation: Mutation) -> Result<TxOutcome, TrackerError> {
        let tx_id = self.ids.generate_tx_id();
        let span = info_span!("mutation", tx = %tx_id, kind = mutation.kind());

        // don't queue behind the mutation that holds the record
        if let Some(busy) = self.busy_target(mutation.targets()) {
            return Err(TrackerError::Busy(busy));
        }
        let turn = Arc::clone(&self.turn).lock_owned().await;

        let (pending, changed) = span.in_scope(|| self.begin(tx_id, &mutation))?;
        if pending.touched.is_empty() {
            pending.confirm();
            return Ok(TxOutcome {
                tx_id,
                state: TxState::Confirmed,
                records: Vec::new(),
                remote_called: false,
            });
        }

        let repository = Arc::clone(&self.repository);
        let bus = Arc::clone(&self.bus);
        let user = self.user;
        let task = tokio::spawn(
            async move {
                let _turn = turn;
                let touched = pending.touched.clone();
                match push(repository.as_ref(), &mutation, &touched, &changed).await {
                    Ok(()) => {
                        pending.confirm();
                        info!(records = touched.len(), "mutation confirmed");
                        let signal = match mutation {
                            Mutation::Move { .. } => Signal::RecordsMoved {
                                user,
                                records: touched,
                            },
                            Mutation::Delete { .. } => Signal::RecordsDeleted {
                                user,
                                records: touched,
                            },
                        };
                        bus.publish(&signal);
                        Ok(TxOutcome {
                            tx_id,
                            state: TxState::Confirmed,
                            records: changed,
                            remote_called: true,
                        })
                    }
                    Err(err) => {
                        let restored = pending.rollback();
                        warn!(error = %err, restored, "mutation rolled back");
                        Err(TrackerError::RemoteFailure(err))
                    }
                }
            }
            .instrument(span),
        );

        match task.await {
            Ok(result) => result,
            Err(join) => Err(TrackerError::Internal(format!("mutation task failed: {join}"))),
        }
    }

    fn busy_target(&self, targets: &[RecordId]) -> Option<RecordId> {
        let in_flight = self.in_flight.lock();
        targets.iter().copied().find(|id| in_flight.contains_key(id))
    }

    /// Idle -> Applying. Fails with `Busy` or `NotFound` without touching
    /// any state.
    fn begin(
        &self,
        tx_id: TxId,
        mutation: &Mutation,
    ) -> Result<(PendingMutation, Vec<ApplicationRecord>), TrackerError> {
        let mut in_flight = self.in_flight.lock();
        if let Some(busy) = mutation.targets().iter().find(|id| in_flight.contains_key(*id)) {
            return Err(TrackerError::Busy(*busy));
        }

        let applied = self.store.apply(mutation)?;
        for id in &applied.touched {
            in_flight.insert(*id, tx_id);
        }

        let pending = PendingMutation {
            tx_id,
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
            touched: applied.touched,
            snapshot: Some(applied.snapshot),
        };
        Ok((pending, applied.changed))
    }
}

/// The single rollback slot of one mutation.
struct PendingMutation {
    tx_id: TxId,
    store: Arc<StageStore>,
    in_flight: InFlight,
    touched: Vec<RecordId>,
    snapshot: Option<RollbackSnapshot>,
}

impl PendingMutation {
    /// Applying -> Confirmed: drop the snapshot.
    fn confirm(mut self) {
        self.snapshot = None;
    }

    /// Applying -> RolledBack. Returns false when a refresh superseded the
    /// snapshot.
    fn rollback(mut self) -> bool {
        match self.snapshot.take() {
            Some(snapshot) => self.store.restore(snapshot),
            None => false,
        }
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            warn!(tx = %self.tx_id, "mutation abandoned unresolved, restoring snapshot");
            self.store.restore(snapshot);
        }
        let mut in_flight = self.in_flight.lock();
        for id in &self.touched {
            if in_flight.get(id) == Some(&self.tx_id) {
                in_flight.remove(id);
            }
        }
    }
}

/// The remote half of a mutation. Any failed item of a bulk update fails
/// the whole batch.
async fn push(
    repository: &dyn ApplicationRepository,
    mutation: &Mutation,
    touched: &[RecordId],
    changed: &[ApplicationRecord],
) -> Result<(), RepositoryError> {
    match mutation {
        Mutation::Move { stage, .. } => {
            let at = changed
                .iter()
                .map(|record| record.stage_changed_at)
                .max()
                .unwrap_or_default();
            let patch = ApplicationPatch::stage(*stage, at);
            if let [id] = touched {
                repository.update(*id, &patch).await.map(|_| ())
            } else {
                repository
                    .bulk_update(touched, &patch)
                    .await
                    .into_iter()
                    .find_map(Result::err)
                    .map_or(Ok(()), Err)
            }
        }
        Mutation::Delete { .. } => repository.delete(touched).await,
    }
}
