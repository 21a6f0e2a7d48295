//! Completion record schemas
//!
//! The completion record is the authoritative at-most-once marker for
//! "(user, task) is satisfied". Exactly zero or one non-deleted record exists
//! per (user, task) pair; the unique index backs the atomic claim that the
//! recorder relies on under concurrent duplicate requests.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, QuestDoc, ReviewStatus};
use crate::types::TaskKind;

/// Collection name for ecosystem quest completions
pub const QUEST_COMPLETED_COLLECTION: &str = "quest_completed";

/// Collection name for campaign quest completions
pub const CAMPAIGN_QUEST_COMPLETED_COLLECTION: &str = "campaign_quest_completed";

/// Collection name for mini quest completions
pub const MINI_QUEST_COMPLETED_COLLECTION: &str = "mini_quest_completed";

/// Collection name for ecosystem (timed) quest completions
pub const ECOSYSTEM_QUEST_COMPLETED_COLLECTION: &str = "ecosystem_quest_completed";

/// Collection a task kind's completion records live in
pub fn completion_collection(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Quest => QUEST_COMPLETED_COLLECTION,
        TaskKind::CampaignQuest => CAMPAIGN_QUEST_COMPLETED_COLLECTION,
        TaskKind::MiniQuest => MINI_QUEST_COMPLETED_COLLECTION,
        TaskKind::EcosystemQuest => ECOSYSTEM_QUEST_COMPLETED_COLLECTION,
    }
}

/// Completion record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CompletionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Completing user
    pub user_id: String,

    /// Completed task
    pub quest_id: String,

    /// Which collection family this record belongs to
    #[serde(default)]
    pub task_kind: TaskKind,

    /// Owning campaign, copied from the quest definition so the aggregator
    /// can count per-campaign completions with one indexed query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,

    /// Whether the (user, task) pair is satisfied. Never reverts to false.
    #[serde(default)]
    pub done: bool,

    /// Mirrors the submission status for evidence-based tasks
    #[serde(default)]
    pub status: ReviewStatus,

    /// For recurring categories only: when this record expires and the task
    /// becomes completable again. Removed by the TTL sweep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime>,

    /// For delay-gated ecosystem quests: the earliest instant the completion
    /// may be claimed. Set by the start action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<DateTime>,
}

impl CompletionDoc {
    /// A record claimed as done in one shot (auto-verifiable tasks)
    pub fn done_now(user_id: String, quest: &QuestDoc) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            quest_id: quest.quest_id.clone(),
            task_kind: quest.task_kind,
            campaign_id: quest.campaign_id.clone(),
            done: true,
            status: ReviewStatus::Done,
            expires: None,
            timer: None,
        }
    }

    /// A record awaiting moderation of submitted evidence
    pub fn pending_review(user_id: String, quest: &QuestDoc) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            quest_id: quest.quest_id.clone(),
            task_kind: quest.task_kind,
            campaign_id: quest.campaign_id.clone(),
            done: false,
            status: ReviewStatus::Pending,
            expires: None,
            timer: None,
        }
    }

    /// A record holding the start timer of a delay-gated quest
    pub fn started(user_id: String, quest: &QuestDoc, timer: DateTime) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            quest_id: quest.quest_id.clone(),
            task_kind: quest.task_kind,
            campaign_id: quest.campaign_id.clone(),
            done: false,
            status: ReviewStatus::Pending,
            expires: None,
            timer: Some(timer),
        }
    }
}

impl IntoIndexes for CompletionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // The at-most-once invariant: one record per (user, task)
            (
                doc! { "user_id": 1, "quest_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_quest_unique".to_string())
                        .build(),
                ),
            ),
            // Aggregator count query
            (
                doc! { "user_id": 1, "campaign_id": 1, "done": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_campaign_done_index".to_string())
                        .build(),
                ),
            ),
            // TTL sweep for recurring categories; documents without an
            // `expires` field are untouched
            (
                doc! { "expires": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .name("expires_ttl".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CompletionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
