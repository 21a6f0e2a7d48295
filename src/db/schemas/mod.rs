//! Database schemas for the engagement core
//!
//! Defines MongoDB document structures for users, quests, campaigns,
//! submissions and completion records.

mod campaign_completed;
mod completion;
mod metadata;
mod quest;
mod submission;
mod user;

pub use campaign_completed::{CampaignCompletedDoc, CAMPAIGN_COMPLETED_COLLECTION};
pub use completion::{
    completion_collection, CompletionDoc, CAMPAIGN_QUEST_COMPLETED_COLLECTION,
    ECOSYSTEM_QUEST_COMPLETED_COLLECTION, MINI_QUEST_COMPLETED_COLLECTION,
    QUEST_COMPLETED_COLLECTION,
};
pub use metadata::Metadata;
pub use quest::{CampaignDoc, QuestCategory, QuestDoc, CAMPAIGN_COLLECTION, QUEST_COLLECTION};
pub use submission::{ReviewStatus, SubmissionDoc, SUBMISSION_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
