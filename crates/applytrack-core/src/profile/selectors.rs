//! Pure projections over a [`ProfileSnapshot`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Experience, ProfileSnapshot, Skill};

/// Compact summary shown at the top of the profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileHeader {
    pub full_name: String,
    pub headline: Option<String>,
    pub location: Option<String>,
    /// Title of the current position, if any.
    pub current_title: Option<String>,
    pub skill_count: usize,
    pub education_count: usize,
}

pub type SkillsByCategory = BTreeMap<String, Vec<Skill>>;

const UNCATEGORIZED: &str = "other";

pub fn select_header(snapshot: &ProfileSnapshot) -> ProfileHeader {
    let current_title = snapshot
        .experience
        .iter()
        .filter(|e| e.is_current())
        .max_by_key(|e| e.started_on)
        .map(|e| e.title.clone());

    ProfileHeader {
        full_name: snapshot.profile.full_name.clone(),
        headline: snapshot.profile.headline.clone(),
        location: snapshot.profile.location.clone(),
        current_title,
        skill_count: snapshot.skills.len(),
        education_count: snapshot.education.len(),
    }
}

/// Skills grouped by category, names sorted case-insensitively within
/// each group.
pub fn select_skills_by_category(snapshot: &ProfileSnapshot) -> SkillsByCategory {
    let mut groups = SkillsByCategory::new();
    for skill in &snapshot.skills {
        let category = match skill.category.trim() {
            "" => UNCATEGORIZED.to_string(),
            c => c.to_lowercase(),
        };
        groups.entry(category).or_default().push(skill.clone());
    }
    for skills in groups.values_mut() {
        skills.sort_by_key(|s| s.name.to_lowercase());
    }
    groups
}

/// Positions newest first; current positions before finished ones.
pub fn select_experience_timeline(snapshot: &ProfileSnapshot) -> Vec<Experience> {
    let mut timeline = snapshot.experience.clone();
    timeline.sort_by(|a, b| {
        b.is_current()
            .cmp(&a.is_current())
            .then(b.started_on.cmp(&a.started_on))
    });
    timeline
}
