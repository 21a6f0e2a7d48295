//! Campaign completion document schema
//!
//! One record per (user, campaign), created exactly once when the user's done
//! campaign-quest count reaches the campaign's declared quest count. Its
//! existence is the re-entrancy guard that keeps the claim gateway from being
//! triggered twice.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for campaign completions
pub const CAMPAIGN_COMPLETED_COLLECTION: &str = "campaign_completed";

/// Campaign completion record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CampaignCompletedDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Completing user
    pub user_id: String,

    /// Completed campaign
    pub campaign_id: String,

    /// Whether the claim-eligibility call to the chain executor was issued
    #[serde(default)]
    pub claimed: bool,

    /// Whether the gateway call is deferred (executor unreachable or the
    /// campaign has no deployed contract yet). Picked up by the
    /// reconciliation sweep.
    #[serde(default)]
    pub claim_pending: bool,
}

impl CampaignCompletedDoc {
    /// Create a new campaign completion, with the gateway call still owed
    pub fn new(user_id: String, campaign_id: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            campaign_id,
            claimed: false,
            claim_pending: false,
        }
    }
}

impl IntoIndexes for CampaignCompletedDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One completion per (user, campaign)
            (
                doc! { "user_id": 1, "campaign_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_campaign_unique".to_string())
                        .build(),
                ),
            ),
            // Reconciliation sweep scans
            (
                doc! { "claim_pending": 1 },
                Some(
                    IndexOptions::builder()
                        .name("claim_pending_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CampaignCompletedDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
