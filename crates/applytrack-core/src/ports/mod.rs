//! Ports - 外部協調者への抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。リモート永続化、プロフィール
//! 取得、ローカル KV、時刻、ID 生成はすべて trait 越しに注入されます。
//!
//! # 設計原則
//! - リモートストアが source of truth（正本）
//! - ローカル状態は楽観的コピー + TTL キャッシュ

pub mod change_feed;
pub mod clock;
pub mod id_generator;
pub mod kv_store;
pub mod profile_source;
pub mod repository;

pub use self::change_feed::{ChangeEventType, ChangeNotification};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::kv_store::KeyValueStore;
pub use self::profile_source::ProfileSource;
pub use self::repository::{ApplicationFilter, ApplicationRepository};
