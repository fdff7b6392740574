//! Errors - エラー型と分類
//!
//! Cache misses are not errors: `CacheStore::get` returns `Option`.

use thiserror::Error;

use super::ids::RecordId;

/// ErrorKind は呼び出し側向けの運用分類
///
/// - Transient: 少し待てば成功しうる（Busy）
/// - Permanent: 再試行しても無意味（NotFound）
/// - Infrastructure: 外部協調者の障害（remote / storage）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("record {0} already has a mutation in flight")]
    Busy(RecordId),

    #[error("remote failure: {0}")]
    RemoteFailure(#[from] RepositoryError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::Busy(_) => ErrorKind::Transient,
            TrackerError::NotFound(_) | TrackerError::Serialization(_) => ErrorKind::Permanent,
            TrackerError::RemoteFailure(_)
            | TrackerError::Storage(_)
            | TrackerError::Internal(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Failure reported by the persistence collaborator.
///
/// Retry policy belongs to the collaborator; the core only surfaces these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("rejected by remote store: {0}")]
    Rejected(String),

    #[error("remote call timed out")]
    Timeout,

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::busy(TrackerError::Busy(RecordId::new(1)), ErrorKind::Transient)]
    #[case::not_found(TrackerError::NotFound(RecordId::new(1)), ErrorKind::Permanent)]
    #[case::remote(TrackerError::RemoteFailure(RepositoryError::Timeout), ErrorKind::Infrastructure)]
    #[case::storage(TrackerError::Storage("disk full".into()), ErrorKind::Infrastructure)]
    fn errors_are_classified(#[case] err: TrackerError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn repository_errors_convert_into_remote_failure() {
        let err: TrackerError = RepositoryError::Rejected("constraint".into()).into();
        assert!(matches!(err, TrackerError::RemoteFailure(_)));
        assert!(err.to_string().contains("constraint"));
    }
}
