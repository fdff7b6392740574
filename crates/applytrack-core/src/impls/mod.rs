//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryApplicationRepository**: 失敗注入つきの永続化コラボレータ
//! - **InMemoryProfileSource**: プロフィール集約のソース
//! - **InMemoryKeyValueStore** / **JsonFileKeyValueStore**: ローカル KV
//! - **ChangeFeedPump**: 変更通知 -> InvalidationBus のアダプタ
//!
//! 本番用の remote store / realtime transport は別クレートで実装します。

pub mod change_feed;
pub mod inmem_kv;
pub mod inmem_profile;
pub mod inmem_repository;
pub mod json_file_kv;

pub use self::change_feed::{ChangeFeedPump, PumpReport, translate};
pub use self::inmem_kv::InMemoryKeyValueStore;
pub use self::inmem_profile::InMemoryProfileSource;
pub use self::inmem_repository::InMemoryApplicationRepository;
pub use self::json_file_kv::JsonFileKeyValueStore;
