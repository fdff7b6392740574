//! Pipeline stages and their progression sets.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Pipeline stage of a job application.
///
/// Ordering follows the pipeline: Interested < Applied < PhoneScreen <
/// Interview < Offer < Rejected. Rejected is terminal and sits outside the
/// progression chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Interested,
    Applied,
    PhoneScreen,
    Interview,
    Offer,
    Rejected,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Interested,
        Stage::Applied,
        Stage::PhoneScreen,
        Stage::Interview,
        Stage::Offer,
        Stage::Rejected,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`Stage::ALL`]; used to index per-stage arrays.
    pub fn index(self) -> usize {
        match self {
            Stage::Interested => 0,
            Stage::Applied => 1,
            Stage::PhoneScreen => 2,
            Stage::Interview => 3,
            Stage::Offer => 4,
            Stage::Rejected => 5,
        }
    }

    /// Is this a terminal stage (not part of the progression chain)?
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Rejected)
    }

    /// Stages a record sitting in `self` is considered to have passed through.
    ///
    /// Prefix-closed over [`Stage::ALL`] for every non-terminal stage:
    /// Interview implies {Interested, Applied, PhoneScreen, Interview}.
    /// Rejected only names itself.
    pub fn progression(self) -> &'static [Stage] {
        if self.is_terminal() {
            return &Self::ALL[5..6];
        }
        &Self::ALL[..=self.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Interested => "interested",
            Stage::Applied => "applied",
            Stage::PhoneScreen => "phone_screen",
            Stage::Interview => "interview",
            Stage::Offer => "offer",
            Stage::Rejected => "rejected",
        }
    }

    /// Strict parse of a stage name.
    ///
    /// Accepts the snake_case wire names plus the camelCase spelling
    /// (`phoneScreen`) produced by older clients.
    pub fn parse(value: &str) -> Option<Stage> {
        match value.trim() {
            "interested" => Some(Stage::Interested),
            "applied" => Some(Stage::Applied),
            "phone_screen" | "phoneScreen" => Some(Stage::PhoneScreen),
            "interview" => Some(Stage::Interview),
            "offer" => Some(Stage::Offer),
            "rejected" => Some(Stage::Rejected),
            _ => None,
        }
    }

    /// Lenient parse: unknown or missing stage values count as Interested.
    pub fn parse_lenient(value: Option<&str>) -> Stage {
        value.and_then(Stage::parse).unwrap_or(Stage::Interested)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(Stage::parse_lenient(raw.as_deref()))
    }
}
