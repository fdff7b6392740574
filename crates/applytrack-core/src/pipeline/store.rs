//! Stage store: authoritative local partition of records by stage.
//!
//! Design:
//! - `records` is the single source of truth for record fields.
//! - `columns` hold RecordIds only, one ordered list per stage
//!   (front = most recently moved in).
//! - Invariant: every record id appears in exactly one column, the one
//!   named by its `stage`, and no column holds an unknown id.
//! - Every mutation happens under one write lock, so readers never see a
//!   half-applied batch.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::stats::{PipelineStats, compute_stats};
use crate::domain::{ApplicationRecord, RecordId, Stage, TrackerError};
use crate::ports::Clock;

/// A local mutation the coordinator can apply and roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Move { ids: Vec<RecordId>, stage: Stage },
    Delete { ids: Vec<RecordId> },
}

impl Mutation {
    pub fn targets(&self) -> &[RecordId] {
        match self {
            Mutation::Move { ids, .. } | Mutation::Delete { ids } => ids,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Move { ids, .. } if ids.len() == 1 => "move",
            Mutation::Move { .. } => "bulk_move",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// One kanban column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub stage: Stage,
    pub records: Vec<ApplicationRecord>,
}

/// Consistent copy of every column, read under one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
    pub revision: u64,
}

impl Board {
    /// Records of `stage`, empty when the board has no such column.
    pub fn column(&self, stage: Stage) -> &[ApplicationRecord] {
        self.columns
            .iter()
            .find(|column| column.stage == stage)
            .map_or(&[], |column| column.records.as_slice())
    }
}

/// What a record looked like (and where it sat) before a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotEntry {
    record: ApplicationRecord,
    index: usize,
}

/// Single-slot pre-mutation copy of the touched records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RollbackSnapshot {
    generation: u64,
    entries: Vec<SnapshotEntry>,
}

/// Result of applying a mutation locally.
#[derive(Debug)]
pub(crate) struct Applied {
    pub snapshot: RollbackSnapshot,
    /// Records after the change (empty for deletes).
    pub changed: Vec<ApplicationRecord>,
    /// Ids that actually changed.
    pub touched: Vec<RecordId>,
}

struct StageState {
    records: HashMap<RecordId, ApplicationRecord>,
    columns: [VecDeque<RecordId>; Stage::COUNT],
    /// Bumped by `replace_all`; a rollback from an older generation is void.
    generation: u64,
    /// Bumped by every change; used as a cache version tag.
    revision: u64,
}

impl StageState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            columns: Default::default(),
            generation: 0,
            revision: 0,
        }
    }

    fn position(&self, id: RecordId) -> Option<(Stage, usize)> {
        let stage = self.records.get(&id)?.stage;
        let index = self.columns[stage.index()].iter().position(|x| *x == id)?;
        Some((stage, index))
    }

    fn detach(&mut self, id: RecordId) {
        if let Some((stage, index)) = self.position(id) {
            self.columns[stage.index()].remove(index);
        }
    }

    /// Validate and dedupe targets; fails on the first unknown id.
    fn resolve(&self, ids: &[RecordId]) -> Result<Vec<RecordId>, TrackerError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.records.contains_key(id) {
                return Err(TrackerError::NotFound(*id));
            }
            if seen.insert(*id) {
                unique.push(*id);
            }
        }
        Ok(unique)
    }

    fn snapshot(&self, ids: &[RecordId]) -> RollbackSnapshot {
        let entries = ids
            .iter()
            .filter_map(|id| {
                let (_, index) = self.position(*id)?;
                let record = self.records.get(id)?.clone();
                Some(SnapshotEntry { record, index })
            })
            .collect();
        RollbackSnapshot {
            generation: self.generation,
            entries,
        }
    }

    fn move_one(&mut self, id: RecordId, stage: Stage, now: chrono::DateTime<chrono::Utc>) -> bool {
        let Some(current) = self.records.get(&id).map(|r| r.stage) else {
            return false;
        };
        if current == stage {
            return false;
        }
        self.detach(id);
        self.columns[stage.index()].push_front(id);
        if let Some(record) = self.records.get_mut(&id) {
            record.enter_stage(stage, now);
        }
        true
    }

    fn delete_one(&mut self, id: RecordId) -> bool {
        self.detach(id);
        self.records.remove(&id).is_some()
    }

    fn column_records(&self, stage: Stage) -> Vec<ApplicationRecord> {
        self.columns[stage.index()]
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }
}

/// Authoritative in-memory board for one session.
///
/// Only the transaction coordinator mutates it (plus `replace_all` on
/// refresh); any number of readers may query it.
pub struct StageStore {
    clock: Arc<dyn Clock>,
    state: RwLock<StageState>,
}

impl StageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(StageState::new()),
        }
    }

    /// Full resynchronization from a fresh fetch.
    ///
    /// Regroups by stage keeping the fetched order, and voids any pending
    /// rollback: an explicit refresh wins over an in-flight optimistic
    /// mutation's eventual rollback.
    pub fn replace_all(&self, records: Vec<ApplicationRecord>) {
        let mut state = self.state.write();
        let mut fresh = StageState::new();
        fresh.generation = state.generation + 1;
        fresh.revision = state.revision + 1;

        for record in records {
            if fresh.records.contains_key(&record.id) {
                warn!(record = %record.id, "duplicate record in refresh, keeping first");
                continue;
            }
            fresh.columns[record.stage.index()].push_back(record.id);
            fresh.records.insert(record.id, record);
        }
        debug!(records = fresh.records.len(), generation = fresh.generation, "stage store replaced");
        *state = fresh;
    }

    /// Snapshot the touched records, then apply `mutation`, atomically.
    ///
    /// Fails with `NotFound` (and changes nothing) if any target is absent.
    /// Moves are applied one id at a time in the given order: the last id of
    /// a batch ends up at the front of the destination column.
    pub(crate) fn apply(&self, mutation: &Mutation) -> Result<Applied, TrackerError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let ids = state.resolve(mutation.targets())?;

        let touched: Vec<RecordId> = match mutation {
            Mutation::Move { stage, .. } => ids
                .iter()
                .copied()
                .filter(|id| state.records.get(id).is_some_and(|r| r.stage != *stage))
                .collect(),
            Mutation::Delete { .. } => ids,
        };
        let snapshot = state.snapshot(&touched);

        let mut changed = Vec::new();
        match mutation {
            Mutation::Move { stage, .. } => {
                for id in &touched {
                    state.move_one(*id, *stage, now);
                }
                changed.extend(touched.iter().filter_map(|id| state.records.get(id).cloned()));
            }
            Mutation::Delete { .. } => {
                for id in &touched {
                    state.delete_one(*id);
                }
            }
        }
        if !touched.is_empty() {
            state.revision += 1;
        }

        Ok(Applied {
            snapshot,
            changed,
            touched,
        })
    }

    /// Put the snapshotted records back exactly where they were.
    ///
    /// Returns false when a `replace_all` happened since the snapshot was
    /// taken; the refreshed state is kept.
    pub(crate) fn restore(&self, snapshot: RollbackSnapshot) -> bool {
        let mut state = self.state.write();
        if state.generation != snapshot.generation {
            debug!(
                snapshot_generation = snapshot.generation,
                generation = state.generation,
                "refresh superseded rollback"
            );
            return false;
        }

        for entry in &snapshot.entries {
            state.detach(entry.record.id);
            state.records.remove(&entry.record.id);
        }

        let mut entries = snapshot.entries;
        entries.sort_by_key(|e| (e.record.stage.index(), e.index));
        for entry in entries {
            let column = &mut state.columns[entry.record.stage.index()];
            let index = entry.index.min(column.len());
            column.insert(index, entry.record.id);
            state.records.insert(entry.record.id, entry.record);
        }
        state.revision += 1;
        true
    }

    pub fn get(&self, id: RecordId) -> Option<ApplicationRecord> {
        self.state.read().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records of one column, front first.
    pub fn column(&self, stage: Stage) -> Vec<ApplicationRecord> {
        self.state.read().column_records(stage)
    }

    pub fn column_ids(&self, stage: Stage) -> Vec<RecordId> {
        self.state.read().columns[stage.index()].iter().copied().collect()
    }

    pub fn board(&self) -> Board {
        let state = self.state.read();
        Board {
            columns: Stage::ALL
                .iter()
                .map(|stage| BoardColumn {
                    stage: *stage,
                    records: state.column_records(*stage),
                })
                .collect(),
            revision: state.revision,
        }
    }

    /// Every record together with the revision it was read at.
    pub fn records_at_revision(&self) -> (Vec<ApplicationRecord>, u64) {
        let state = self.state.read();
        let records = Stage::ALL
            .iter()
            .flat_map(|stage| state.column_records(*stage))
            .collect();
        (records, state.revision)
    }

    /// Statistics over the current snapshot, computed under one read lock.
    pub fn stats(&self) -> PipelineStats {
        let state = self.state.read();
        compute_stats(state.records.values())
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Check the partition invariant (union of columns == record set, no
    /// duplicates, each id in the column of its stage).
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        let mut seen = HashSet::new();
        for stage in Stage::ALL {
            for id in &state.columns[stage.index()] {
                let in_right_column = state.records.get(id).is_some_and(|r| r.stage == stage);
                if !in_right_column || !seen.insert(*id) {
                    return false;
                }
            }
        }
        seen.len() == state.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::ports::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn record(id: u128, stage: Stage) -> ApplicationRecord {
        ApplicationRecord::new(RecordId::new(id), UserId::new(1), "Acme", "Engineer", stage, t0())
    }

    fn store_with(records: Vec<ApplicationRecord>) -> (StageStore, FixedClock) {
        let clock = FixedClock::new(t0());
        let store = StageStore::new(Arc::new(clock.clone()));
        store.replace_all(records);
        (store, clock)
    }

    fn ids(raw: &[u128]) -> Vec<RecordId> {
        raw.iter().map(|i| RecordId::new(*i)).collect()
    }

    fn move_to(store: &StageStore, raw: &[u128], stage: Stage) -> Result<usize, TrackerError> {
        let applied = store.apply(&Mutation::Move {
            ids: ids(raw),
            stage,
        })?;
        Ok(applied.touched.len())
    }

    #[test]
    fn replace_all_groups_by_stage_in_fetched_order() {
        let (store, _) = store_with(vec![
            record(1, Stage::Applied),
            record(2, Stage::Interview),
            record(3, Stage::Applied),
        ]);
        assert_eq!(store.column_ids(Stage::Applied), ids(&[1, 3]));
        assert_eq!(store.column_ids(Stage::Interview), ids(&[2]));
        assert!(store.is_consistent());
    }

    #[test]
    fn replace_all_drops_duplicate_ids() {
        let (store, _) = store_with(vec![record(1, Stage::Applied), record(1, Stage::Offer)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(RecordId::new(1)).unwrap().stage, Stage::Applied);
        assert!(store.is_consistent());
    }

    #[test]
    fn move_prepends_and_stamps_time() {
        let (store, clock) = store_with(vec![
            record(1, Stage::Interview),
            record(2, Stage::Applied),
        ]);
        clock.advance(Duration::minutes(5));

        assert_eq!(move_to(&store, &[2], Stage::Interview).unwrap(), 1);
        assert_eq!(store.column_ids(Stage::Interview), ids(&[2, 1]));
        assert!(store.column_ids(Stage::Applied).is_empty());

        let moved = store.get(RecordId::new(2)).unwrap();
        assert_eq!(moved.stage, Stage::Interview);
        assert_eq!(moved.stage_changed_at, t0() + Duration::minutes(5));
    }

    #[test]
    fn move_to_same_stage_is_a_successful_noop() {
        let (store, clock) = store_with(vec![record(1, Stage::Applied), record(2, Stage::Applied)]);
        let revision = store.revision();
        clock.advance(Duration::minutes(5));

        assert_eq!(move_to(&store, &[2], Stage::Applied).unwrap(), 0);
        assert_eq!(store.column_ids(Stage::Applied), ids(&[1, 2]));
        assert_eq!(store.get(RecordId::new(2)).unwrap().stage_changed_at, t0());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn move_unknown_record_is_not_found() {
        let (store, _) = store_with(vec![record(1, Stage::Applied)]);
        let err = move_to(&store, &[9], Stage::Offer).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(id) if id == RecordId::new(9)));
    }

    #[test]
    fn bulk_move_with_missing_id_changes_nothing() {
        let (store, _) = store_with(vec![record(1, Stage::Applied), record(2, Stage::Applied)]);
        let before = store.board();

        let err = move_to(&store, &[1, 99, 2], Stage::Offer).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
        assert_eq!(store.board(), before);
    }

    #[test]
    fn bulk_move_is_sequential_and_deduplicated() {
        let (store, _) = store_with(vec![
            record(1, Stage::Applied),
            record(2, Stage::Applied),
            record(3, Stage::PhoneScreen),
            record(4, Stage::Offer),
        ]);

        let moved = move_to(&store, &[1, 3, 1, 2], Stage::Offer).unwrap();
        assert_eq!(moved, 3);
        assert_eq!(store.column_ids(Stage::Offer), ids(&[2, 3, 1, 4]));
        assert_eq!(store.stats().current_by_stage.offer, 4);
        assert!(store.is_consistent());
    }

    #[test]
    fn delete_removes_from_columns_and_record_set() {
        let (store, _) = store_with(vec![
            record(1, Stage::Applied),
            record(2, Stage::Interview),
            record(3, Stage::Applied),
        ]);
        let applied = store.apply(&Mutation::Delete { ids: ids(&[1, 2]) }).unwrap();
        assert_eq!(applied.touched.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.column_ids(Stage::Applied), ids(&[3]));
        assert!(store.column_ids(Stage::Interview).is_empty());
        assert!(store.is_consistent());
    }

    #[rstest]
    #[case::single_move(Mutation::Move { ids: ids(&[2]), stage: Stage::Interview })]
    #[case::bulk_move(Mutation::Move { ids: ids(&[4, 2, 3]), stage: Stage::Offer })]
    #[case::delete(Mutation::Delete { ids: ids(&[3, 1]) })]
    fn restore_is_exact(#[case] mutation: Mutation) {
        let (store, clock) = store_with(vec![
            record(1, Stage::Applied),
            record(2, Stage::Applied),
            record(3, Stage::Applied),
            record(4, Stage::Interview),
            record(5, Stage::Offer),
        ]);
        clock.advance(Duration::hours(1));
        let before = store.board();

        let applied = store.apply(&mutation).unwrap();
        assert_ne!(store.board().columns, before.columns);

        assert!(store.restore(applied.snapshot));
        assert_eq!(store.board().columns, before.columns);
        assert!(store.is_consistent());
    }

    #[test]
    fn restore_after_refresh_keeps_refreshed_state() {
        let (store, _) = store_with(vec![record(1, Stage::Applied)]);
        let applied = store
            .apply(&Mutation::Move {
                ids: ids(&[1]),
                stage: Stage::Offer,
            })
            .unwrap();

        store.replace_all(vec![record(1, Stage::Rejected), record(2, Stage::Applied)]);

        assert!(!store.restore(applied.snapshot));
        assert_eq!(store.get(RecordId::new(1)).unwrap().stage, Stage::Rejected);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn board_lookup_is_by_stage_and_total() {
        let (store, _) = store_with(vec![record(1, Stage::Offer), record(2, Stage::Applied)]);
        let mut board = store.board();
        board.columns.reverse();
        assert_eq!(board.column(Stage::Offer)[0].id, RecordId::new(1));

        let partial: Board =
            serde_json::from_str(r#"{"columns":[{"stage":"interview","records":[]}],"revision":3}"#)
                .unwrap();
        assert!(partial.column(Stage::Interview).is_empty());
        assert!(partial.column(Stage::Rejected).is_empty());
    }

    #[test]
    fn partition_holds_for_any_operation_sequence() {
        let (store, _) = store_with((1..=12).map(|i| record(i, Stage::ALL[(i % 6) as usize])).collect());
        let ops: Vec<Mutation> = vec![
            Mutation::Move { ids: ids(&[1, 2, 3]), stage: Stage::Interview },
            Mutation::Delete { ids: ids(&[4]) },
            Mutation::Move { ids: ids(&[5]), stage: Stage::Rejected },
            Mutation::Move { ids: ids(&[1, 6, 7, 8]), stage: Stage::Applied },
            Mutation::Delete { ids: ids(&[2, 9]) },
            Mutation::Move { ids: ids(&[10, 11, 12, 3]), stage: Stage::Interested },
        ];
        for op in &ops {
            store.apply(op).unwrap();
            assert!(store.is_consistent(), "after {op:?}");
            let stats = store.stats();
            for stage in Stage::ALL {
                assert_eq!(stats.current_by_stage.get(stage), store.column_ids(stage).len());
            }
        }
        assert_eq!(store.len(), 9);
    }
}
