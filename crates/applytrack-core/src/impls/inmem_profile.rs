//! InMemoryProfileSource - プロフィール集約の開発用ソース

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{RepositoryError, UserId};
use crate::ports::ProfileSource;
use crate::profile::ProfileSnapshot;

#[derive(Default)]
pub struct InMemoryProfileSource {
    snapshots: Mutex<HashMap<UserId, ProfileSnapshot>>,
    fetches: AtomicUsize,
}

impl InMemoryProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot of `snapshot.profile.user`.
    pub fn put(&self, snapshot: ProfileSnapshot) {
        self.snapshots.lock().insert(snapshot.profile.user, snapshot);
    }

    /// Mutate a stored snapshot in place (the "remote edit" in tests).
    pub fn edit(&self, user: UserId, f: impl FnOnce(&mut ProfileSnapshot)) -> bool {
        match self.snapshots.lock().get_mut(&user) {
            Some(snapshot) => {
                f(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileSource for InMemoryProfileSource {
    async fn fetch_profile(&self, user: UserId) -> Result<ProfileSnapshot, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .get(&user)
            .cloned()
            .ok_or_else(|| RepositoryError::Rejected(format!("no profile for {user}")))
    }
}
