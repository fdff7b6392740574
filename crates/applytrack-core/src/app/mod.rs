//! App - アプリケーション層
//!
//! ports と core コンポーネントを組み合わせ、サインイン中の 1 ユーザー分の
//! セッションを構築します。
//!
//! # 主要コンポーネント
//! - **SessionBuilder**: 依存の検証とワイヤリング
//! - **Session**: StageStore / TransactionCoordinator / InvalidationBus / 各キャッシュを所有
//! - **TrackerConfig**: TTL などの設定
//! - **SessionStatus**: 状態ビュー

pub mod builder;
pub mod config;
pub mod session;
pub mod status;

pub use self::builder::{BuildError, SessionBuilder};
pub use self::config::TrackerConfig;
pub use self::session::Session;
pub use self::status::{NamedCacheStats, SessionStatus};
