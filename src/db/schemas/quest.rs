//! Quest and campaign document schemas
//!
//! Task and campaign definitions are created by project/admin actors and are
//! read-only to this core.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::TaskKind;

/// Collection name for quests
pub const QUEST_COLLECTION: &str = "quests";

/// Collection name for campaigns
pub const CAMPAIGN_COLLECTION: &str = "campaigns";

/// Category tag on a quest definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestCategory {
    /// Social-media action (follow, repost, join)
    #[default]
    Social,
    /// On-chain interaction verified by the indexer
    OnChain,
    /// Content creation, reviewed by moderators
    Content,
    /// Recurring daily quest, completable again after 24h
    Daily,
    /// Recurring weekly quest, completable again after 7 days
    Weekly,
    /// Ecosystem quest, optionally delay-gated by a timer
    Ecosystem,
}

impl QuestCategory {
    /// Seconds until a completion of this category expires, for recurring
    /// categories only
    pub fn expiry_secs(&self) -> Option<i64> {
        match self {
            QuestCategory::Daily => Some(24 * 3600),
            QuestCategory::Weekly => Some(7 * 24 * 3600),
            _ => None,
        }
    }
}

/// Immutable task definition
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuestDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Platform-wide quest identifier
    pub quest_id: String,

    /// Display title
    pub title: String,

    /// Which completion-record collection completions of this quest land in
    #[serde(default)]
    pub task_kind: TaskKind,

    /// Category tag
    #[serde(default)]
    pub category: QuestCategory,

    /// XP awarded on completion
    #[serde(default)]
    pub reward_xp: i64,

    /// Trust tokens awarded on completion (optional)
    #[serde(default)]
    pub reward_trust: i64,

    /// Target URL the user is sent to (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,

    /// Owning campaign; None for ecosystem-wide quests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,

    /// Delay gate for timed ecosystem quests: seconds between start and the
    /// earliest allowed completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,

    /// Whether completions go through moderator review of submitted evidence
    #[serde(default)]
    pub requires_review: bool,
}

impl QuestDoc {
    /// Whether this quest is delay-gated by a start timer
    pub fn is_timed(&self) -> bool {
        self.duration_secs.is_some()
    }
}

impl IntoIndexes for QuestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "quest_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("quest_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "campaign_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("campaign_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for QuestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Campaign definition
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CampaignDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Platform-wide campaign identifier
    pub campaign_id: String,

    /// Display title
    pub title: String,

    /// Owning hub/project
    #[serde(default)]
    pub hub_id: String,

    /// Declared number of quests a user must complete to finish the campaign
    #[serde(default)]
    pub no_of_quests: i64,

    /// Deployed reward contract address; None until the project deploys it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

impl IntoIndexes for CampaignDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "campaign_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("campaign_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CampaignDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
