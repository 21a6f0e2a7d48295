//! Shared types for the engagement core

mod error;

pub use error::{EngagementError, Result};

use serde::{Deserialize, Serialize};

/// Which completion-record collection a task writes into.
///
/// Resolved once when the submission (or auto completion) is created and
/// carried on the documents, never re-derived at review time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Ecosystem-wide quest, not owned by a campaign
    #[default]
    Quest,
    /// Quest belonging to a campaign
    CampaignQuest,
    /// Lightweight hub task reviewed by moderators
    MiniQuest,
    /// Delay-gated ecosystem quest (start, wait, complete)
    EcosystemQuest,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Quest => "quest",
            TaskKind::CampaignQuest => "campaign_quest",
            TaskKind::MiniQuest => "mini_quest",
            TaskKind::EcosystemQuest => "ecosystem_quest",
        }
    }
}

/// Moderator decision on a pending submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Accept,
    Reject,
}

/// Outcome of a completion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Whether this call applied the completion (won the atomic claim)
    pub applied: bool,
    /// Why the completion was skipped, when it was
    pub reason: Option<SkipReason>,
}

impl CompletionOutcome {
    pub fn applied() -> Self {
        Self {
            applied: true,
            reason: None,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            applied: false,
            reason: Some(reason),
        }
    }
}

/// Reason a completion attempt did not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A done completion record already exists for the (user, task) pair
    AlreadyCompleted,
}
