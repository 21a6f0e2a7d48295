//! Submission document schema
//!
//! One user's evidence for one task, routed through moderator review.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::TaskKind;

/// Collection name for submissions
pub const SUBMISSION_COLLECTION: &str = "submissions";

/// Review lifecycle of a submission and its linked completion record.
///
/// Legal transitions: Pending -> Done, Pending -> Retry, Retry -> Pending
/// (re-submission). Done is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Awaiting moderator review
    #[default]
    Pending,
    /// Accepted; terminal
    Done,
    /// Rejected, awaiting user re-submission
    Retry,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Done => "done",
            ReviewStatus::Retry => "retry",
        }
    }
}

/// Submission document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubmissionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Submission identifier
    pub submission_id: String,

    /// Submitting user
    pub user_id: String,

    /// Task the evidence is for
    pub quest_id: String,

    /// Which completion-record collection the linked record lives in.
    /// Resolved once at submission creation, never re-derived at review time.
    #[serde(default)]
    pub task_kind: TaskKind,

    /// Link to the evidence (post URL, tx hash, upload)
    pub evidence_link: String,

    /// Review status
    #[serde(default)]
    pub status: ReviewStatus,

    /// Display name of the moderator who last reviewed this submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,

    /// Owning hub/project
    #[serde(default)]
    pub hub_id: String,
}

impl SubmissionDoc {
    /// Create a new pending submission
    pub fn new(
        submission_id: String,
        user_id: String,
        quest_id: String,
        task_kind: TaskKind,
        evidence_link: String,
        hub_id: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            submission_id,
            user_id,
            quest_id,
            task_kind,
            evidence_link,
            status: ReviewStatus::Pending,
            validated_by: None,
            hub_id,
        }
    }
}

impl IntoIndexes for SubmissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "submission_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("submission_id_unique".to_string())
                        .build(),
                ),
            ),
            // One submission per (user, task)
            (
                doc! { "user_id": 1, "quest_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_quest_unique".to_string())
                        .build(),
                ),
            ),
            // Moderator queue scans
            (
                doc! { "hub_id": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("hub_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SubmissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
