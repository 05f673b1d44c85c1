use std::env;

use log::warn;
use model::incident::{IncidentStatus, VoteTally};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISLIKE_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationConfig {
    /// An incident is deactivated once `dislikes >= likes + dislike_threshold`.
    pub dislike_threshold: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            dislike_threshold: DEFAULT_DISLIKE_THRESHOLD,
        }
    }
}

impl ModerationConfig {
    pub fn from_env() -> Self {
        match env::var("MODERATION_DISLIKE_THRESHOLD") {
            Ok(value) => match value.parse() {
                Ok(dislike_threshold) => Self { dislike_threshold },
                Err(why) => {
                    warn!(
                        "ignoring MODERATION_DISLIKE_THRESHOLD='{}': {}",
                        value, why
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn rejects(&self, tally: &VoteTally) -> bool {
        u64::from(tally.dislikes) >= u64::from(tally.likes) + u64::from(self.dislike_threshold)
    }

    /// Status after a vote mutation. Only ever moves Active to Inactive; an
    /// inactive incident is never re-activated by votes.
    pub fn after_vote(&self, status: IncidentStatus, tally: &VoteTally) -> IncidentStatus {
        match status {
            IncidentStatus::Active if self.rejects(tally) => IncidentStatus::Inactive,
            unchanged => unchanged,
        }
    }
}

/// Manual override issued by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationCommand {
    Enable,
    Disable,
}

impl ModerationCommand {
    pub fn target(&self) -> IncidentStatus {
        match self {
            Self::Enable => IncidentStatus::Active,
            Self::Disable => IncidentStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: IncidentStatus,
    pub to: IncidentStatus,
}

impl Transition {
    /// `None` when the status does not change.
    pub fn between(from: IncidentStatus, to: IncidentStatus) -> Option<Self> {
        (from != to).then_some(Self { from, to })
    }
}
