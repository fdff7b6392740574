//! Profile domain: one aggregated snapshot per user behind a unified cache.
//!
//! ```text
//! ProfileSource::fetch_profile ──► UnifiedDomainCache ("profile:{user}")
//!                                        │
//!             ┌──────────────────────────┼────────────────────────┐
//!       select_header        select_skills_by_category   select_experience_timeline
//! ```

pub mod selectors;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::keys::profile_key;
use crate::cache::{DomainFetcher, UnifiedDomainCache};
use crate::domain::{TrackerError, UserId};
use crate::ports::ProfileSource;

pub use selectors::{
    ProfileHeader, SkillsByCategory, select_experience_timeline, select_header,
    select_skills_by_category,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserId,
    pub full_name: String,

    #[serde(default)]
    pub headline: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,

    /// Free-form grouping ("language", "cloud", ...). Empty means
    /// uncategorized.
    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub years: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub title: String,
    pub started_on: NaiveDate,

    /// `None` while this is the current position.
    #[serde(default)]
    pub ended_on: Option<NaiveDate>,
}

impl Experience {
    pub fn is_current(&self) -> bool {
        self.ended_on.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,

    #[serde(default)]
    pub graduated_on: Option<NaiveDate>,
}

/// Everything the profile views need, fetched in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub profile: Profile,

    #[serde(default)]
    pub skills: Vec<Skill>,

    #[serde(default)]
    pub experience: Vec<Experience>,

    #[serde(default)]
    pub education: Vec<Education>,

    pub fetched_at: DateTime<Utc>,
}

/// [`DomainFetcher`] over a [`ProfileSource`], scoped per user.
pub struct ProfileFetcher {
    source: Arc<dyn ProfileSource>,
}

impl ProfileFetcher {
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl DomainFetcher for ProfileFetcher {
    type Scope = UserId;
    type Snapshot = ProfileSnapshot;

    fn cache_key(&self, user: &UserId) -> String {
        profile_key(*user)
    }

    async fn fetch_all(&self, user: &UserId) -> Result<ProfileSnapshot, TrackerError> {
        Ok(self.source.fetch_profile(*user).await?)
    }
}

pub type ProfileCache = UnifiedDomainCache<ProfileFetcher>;

impl UnifiedDomainCache<ProfileFetcher> {
    pub async fn header(&self, user: UserId) -> Result<ProfileHeader, TrackerError> {
        self.select(&user, select_header).await
    }

    pub async fn skills_by_category(&self, user: UserId) -> Result<SkillsByCategory, TrackerError> {
        self.select(&user, select_skills_by_category).await
    }

    pub async fn experience_timeline(&self, user: UserId) -> Result<Vec<Experience>, TrackerError> {
        self.select(&user, select_experience_timeline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InvalidationBus;
    use crate::domain::{RepositoryError, Signal};
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        calls: AtomicUsize,
        headline: Mutex<String>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn fetch_profile(&self, user: UserId) -> Result<ProfileSnapshot, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock() {
                return Err(RepositoryError::Unavailable("profile service down".into()));
            }
            Ok(ProfileSnapshot {
                profile: Profile {
                    user,
                    full_name: "Kim Lee".into(),
                    headline: Some(self.headline.lock().clone()),
                    location: None,
                },
                skills: vec![Skill {
                    name: "Rust".into(),
                    category: "language".into(),
                    years: Some(4),
                }],
                experience: Vec::new(),
                education: Vec::new(),
                fetched_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            })
        }
    }

    fn setup() -> (Arc<ProfileCache>, Arc<CountingSource>, InvalidationBus) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            headline: Mutex::new("Backend engineer".into()),
            fail: Mutex::new(false),
        });
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let cache = Arc::new(ProfileCache::new(
            "profile",
            ProfileFetcher::new(source.clone()),
            Duration::from_secs(600),
            Arc::new(clock),
        ));
        let bus = InvalidationBus::new();
        bus.register(cache.store());
        (cache, source, bus)
    }

    #[tokio::test]
    async fn all_views_come_from_one_fetch() {
        let (cache, source, _) = setup();
        let user = UserId::new(3);

        let header = cache.header(user).await.unwrap();
        let skills = cache.skills_by_category(user).await.unwrap();
        let timeline = cache.experience_timeline(user).await.unwrap();

        assert_eq!(header.headline.as_deref(), Some("Backend engineer"));
        assert_eq!(skills["language"].len(), 1);
        assert!(timeline.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skills_signal_refreshes_every_view() {
        let (cache, source, bus) = setup();
        let user = UserId::new(3);
        cache.header(user).await.unwrap();

        *source.headline.lock() = "Staff engineer".into();
        bus.publish(&Signal::SkillsChanged { user });

        let header = cache.header(user).await.unwrap();
        assert_eq!(header.headline.as_deref(), Some("Staff engineer"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_and_is_not_cached() {
        let (cache, source, _) = setup();
        let user = UserId::new(3);
        *source.fail.lock() = true;

        let err = cache.header(user).await.unwrap_err();
        assert!(matches!(err, TrackerError::RemoteFailure(_)));
        assert!(cache.cached(&user).is_none());

        *source.fail.lock() = false;
        assert!(cache.header(user).await.is_ok());
    }
}
