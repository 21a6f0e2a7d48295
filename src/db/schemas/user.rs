//! User document schema
//!
//! Holds the reward aggregates mutated by the completion recorder and the
//! reward engine. User documents are created by the auth subsystem and are
//! never deleted by this core.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Platform-wide user identifier
    pub user_id: String,

    /// Display name, used for the moderator identity on reviewed submissions
    #[serde(default)]
    pub display_name: String,

    /// Accumulated experience. Non-negative, monotonically non-decreasing.
    #[serde(default)]
    pub xp: i64,

    /// Accrued trust token amount. Monotonically non-decreasing.
    #[serde(default)]
    pub trust_earned: i64,

    /// Number of ecosystem quests completed
    #[serde(default)]
    pub quests_completed: i64,

    /// Number of campaign tasks completed
    #[serde(default)]
    pub tasks_completed: i64,

    /// Levels whose badge NFT the external executor confirmed minted.
    /// Used strictly for mint idempotency, never for level computation.
    #[serde(default)]
    pub badges: Vec<i32>,

    /// Levels for which a mint was requested but not yet confirmed.
    /// The atomic add into this set is the at-most-once guard on allow_mint.
    #[serde(default)]
    pub pending_mints: Vec<i32>,

    /// Whether the user account is active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    /// Create a new user document
    pub fn new(user_id: String, display_name: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            display_name,
            xp: 0,
            trust_earned: 0,
            quests_completed: 0,
            tasks_completed: 0,
            badges: Vec::new(),
            pending_mints: Vec::new(),
            is_active: true,
        }
    }

    /// Whether a badge for this level has been confirmed minted
    pub fn has_badge(&self, level: i32) -> bool {
        self.badges.contains(&level)
    }

    /// Whether a mint for this level is already requested or confirmed
    pub fn mint_in_flight_or_done(&self, level: i32) -> bool {
        self.badges.contains(&level) || self.pending_mints.contains(&level)
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on user_id
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
