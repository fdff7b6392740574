//! applytrack-core
//!
//! Pipeline state and cache-consistency engine for a job-application
//! tracker.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, stage, record, errors, events）
//! - **ports**: 外部コラボレータの抽象（ApplicationRepository, ProfileSource, KeyValueStore, Clock など）
//! - **cache**: TTL + version キャッシュ、InvalidationBus、UnifiedDomainCache
//! - **pipeline**: StageStore、統計、TransactionCoordinator（楽観的更新 + rollback）
//! - **analytics** / **profile** / **schedule**: キャッシュ層を使うデータドメイン
//! - **impls**: 実装（InMemory 系、JSON ファイル KV、change feed アダプタ）
//! - **app**: SessionBuilder / Session / TrackerConfig

pub mod analytics;
pub mod app;
pub mod cache;
pub mod domain;
pub mod impls;
pub mod pipeline;
pub mod ports;
pub mod profile;
pub mod schedule;

pub use app::{BuildError, Session, SessionBuilder, SessionStatus, TrackerConfig};
pub use domain::{ApplicationRecord, RecordId, Stage, TrackerError, UserId};
