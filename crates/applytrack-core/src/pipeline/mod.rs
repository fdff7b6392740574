//! Pipeline: stage store, statistics and the optimistic mutation protocol.

pub mod stats;
pub mod store;
pub mod transaction;

pub use stats::{PipelineStats, StageCounts, compute_stats};
pub use store::{Board, BoardColumn, Mutation, StageStore};
pub use transaction::{TransactionCoordinator, TxOutcome, TxState};
