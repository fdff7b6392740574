//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型付けしています。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 別タブ・別端末で生成しても衝突しない
//!
//! ## Phantom Type パターン
//! `Id<T>` が共通実装を持ち、`T` はコンパイル時だけ使うマーカー型です。
//! RecordId と UserId を取り違えるとコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"app-", "user-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let record: RecordId = Id::from(Ulid::new());
/// let user: UserId = Id::from(Ulid::new());
/// // record と user は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Deterministic id from a plain number (fixtures, seeded data).
    ///
    /// The value is interpreted as the raw 128-bit ULID, so `Id::new(42)`
    /// always refers to the same record.
    pub fn new(value: u128) -> Self {
        Self::from_ulid(Ulid::from_bytes(value.to_be_bytes()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

// derive would put `T: Clone` etc. bounds on the marker; implement by hand instead.
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ulid == other.ulid
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ulid.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ulid.cmp(&other.ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Job application のマーカー型
pub enum Application {}

impl IdMarker for Application {
    fn prefix() -> &'static str {
        "app-"
    }
}

/// Signed-in user のマーカー型
pub enum User {}

impl IdMarker for User {
    fn prefix() -> &'static str {
        "user-"
    }
}

/// Optimistic mutation (transaction) のマーカー型
pub enum Transaction {}

impl IdMarker for Transaction {
    fn prefix() -> &'static str {
        "tx-"
    }
}

/// Schedule entry のマーカー型
pub enum Schedule {}

impl IdMarker for Schedule {
    fn prefix() -> &'static str {
        "sched-"
    }
}

/// Identifier of a job-application record.
pub type RecordId = Id<Application>;

/// Identifier of the signed-in user owning a session.
pub type UserId = Id<User>;

/// Identifier of one optimistic mutation (used for log correlation).
pub type TxId = Id<Transaction>;

/// Identifier of a schedule entry (interview, follow-up, deadline).
pub type ScheduleId = Id<Schedule>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let record = RecordId::from_ulid(ulid1);
        let user = UserId::from_ulid(ulid2);

        assert_eq!(record.as_ulid(), ulid1);
        assert_eq!(user.as_ulid(), ulid2);

        assert!(record.to_string().starts_with("app-"));
        assert!(user.to_string().starts_with("user-"));
        assert!(TxId::new(1).to_string().starts_with("tx-"));
        assert!(ScheduleId::new(1).to_string().starts_with("sched-"));
        // let _: UserId = record; // <- does not compile
    }

    #[test]
    fn numeric_ids_are_stable() {
        assert_eq!(RecordId::new(42), RecordId::new(42));
        assert_ne!(RecordId::new(42), RecordId::new(43));
        assert!(RecordId::new(1) < RecordId::new(2));
    }

    #[test]
    fn ids_serialize_as_plain_ulid_strings() {
        let id = RecordId::new(42);
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, format!("\"{}\"", id.as_ulid()));

        let back: RecordId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<RecordId>(), size_of::<Ulid>());
        assert_eq!(size_of::<UserId>(), 16);
    }
}
