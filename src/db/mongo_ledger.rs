//! MongoDB-backed ledger store
//!
//! Maps the [`LedgerStore`] boundary onto the house collection wrapper. The
//! unique indexes declared by the schemas back every insert-if-absent, and
//! `$inc`/`$addToSet` writes keep the user document's aggregates atomic
//! without cross-document transactions.

use async_trait::async_trait;
use bson::{doc, DateTime};
use mongodb::options::ReturnDocument;
use tracing::debug;

use crate::db::ledger::{Accrual, CompletionCounter, LedgerStore};
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    CampaignCompletedDoc, CampaignDoc, CompletionDoc, QuestDoc,
    ReviewStatus, SubmissionDoc, UserDoc, CAMPAIGN_COLLECTION, CAMPAIGN_COMPLETED_COLLECTION,
    CAMPAIGN_QUEST_COMPLETED_COLLECTION, ECOSYSTEM_QUEST_COMPLETED_COLLECTION,
    MINI_QUEST_COMPLETED_COLLECTION, QUEST_COLLECTION, QUEST_COMPLETED_COLLECTION,
    SUBMISSION_COLLECTION, USER_COLLECTION,
};
use crate::types::{EngagementError, Result, TaskKind};

/// Ledger store over MongoDB collections
pub struct MongoLedger {
    users: MongoCollection<UserDoc>,
    quests: MongoCollection<QuestDoc>,
    campaigns: MongoCollection<CampaignDoc>,
    submissions: MongoCollection<SubmissionDoc>,
    quest_completed: MongoCollection<CompletionDoc>,
    campaign_quest_completed: MongoCollection<CompletionDoc>,
    mini_quest_completed: MongoCollection<CompletionDoc>,
    ecosystem_quest_completed: MongoCollection<CompletionDoc>,
    campaign_completed: MongoCollection<CampaignCompletedDoc>,
}

impl MongoLedger {
    /// Create the ledger, materializing collections and their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: mongo.collection(USER_COLLECTION).await?,
            quests: mongo.collection(QUEST_COLLECTION).await?,
            campaigns: mongo.collection(CAMPAIGN_COLLECTION).await?,
            submissions: mongo.collection(SUBMISSION_COLLECTION).await?,
            quest_completed: mongo.collection(QUEST_COMPLETED_COLLECTION).await?,
            campaign_quest_completed: mongo
                .collection(CAMPAIGN_QUEST_COMPLETED_COLLECTION)
                .await?,
            mini_quest_completed: mongo.collection(MINI_QUEST_COMPLETED_COLLECTION).await?,
            ecosystem_quest_completed: mongo
                .collection(ECOSYSTEM_QUEST_COMPLETED_COLLECTION)
                .await?,
            campaign_completed: mongo.collection(CAMPAIGN_COMPLETED_COLLECTION).await?,
        })
    }

    /// Completion collection for a task kind
    fn completions(&self, kind: TaskKind) -> &MongoCollection<CompletionDoc> {
        match kind {
            TaskKind::Quest => &self.quest_completed,
            TaskKind::CampaignQuest => &self.campaign_quest_completed,
            TaskKind::MiniQuest => &self.mini_quest_completed,
            TaskKind::EcosystemQuest => &self.ecosystem_quest_completed,
        }
    }

    fn all_completion_collections(&self) -> [&MongoCollection<CompletionDoc>; 4] {
        [
            &self.quest_completed,
            &self.campaign_quest_completed,
            &self.mini_quest_completed,
            &self.ecosystem_quest_completed,
        ]
    }
}

#[async_trait]
impl LedgerStore for MongoLedger {
    async fn user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "user_id": user_id }).await
    }

    async fn apply_accrual(&self, user_id: &str, accrual: Accrual) -> Result<UserDoc> {
        let counter_field = match accrual.counter {
            CompletionCounter::Quests => "quests_completed",
            CompletionCounter::Tasks => "tasks_completed",
        };

        let update = doc! {
            "$inc": {
                "xp": accrual.xp,
                "trust_earned": accrual.trust,
                counter_field: 1_i64,
            },
            "$set": { "metadata.updated_at": DateTime::now() },
        };

        self.users
            .inner()
            .find_one_and_update(doc! { "user_id": user_id }, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| EngagementError::Database(format!("Accrual update failed: {}", e)))?
            .ok_or_else(|| EngagementError::NotFound(format!("user {}", user_id)))
    }

    async fn reserve_mint(&self, user_id: &str, level: i32) -> Result<bool> {
        // The filter excludes users that already hold or requested the badge,
        // so exactly one concurrent caller can observe a modification.
        self.users
            .compare_and_set(
                doc! {
                    "user_id": user_id,
                    "badges": { "$ne": level },
                    "pending_mints": { "$ne": level },
                },
                doc! {
                    "$addToSet": { "pending_mints": level },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await
    }

    async fn confirm_mint(&self, user_id: &str, level: i32) -> Result<bool> {
        self.users
            .compare_and_set(
                doc! { "user_id": user_id, "badges": { "$ne": level } },
                doc! {
                    "$pull": { "pending_mints": level },
                    "$addToSet": { "badges": level },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await
    }

    async fn quest(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        self.quests.find_one(doc! { "quest_id": quest_id }).await
    }

    async fn campaign(&self, campaign_id: &str) -> Result<Option<CampaignDoc>> {
        self.campaigns
            .find_one(doc! { "campaign_id": campaign_id })
            .await
    }

    async fn completion(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<CompletionDoc>> {
        self.completions(kind)
            .find_one(doc! { "user_id": user_id, "quest_id": quest_id })
            .await
    }

    async fn insert_completion_if_absent(&self, record: CompletionDoc) -> Result<bool> {
        let collection = self.completions(record.task_kind);
        Ok(collection.insert_if_absent(record).await?.is_some())
    }

    async fn mark_completion_done(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        expires: Option<DateTime>,
    ) -> Result<bool> {
        let mut set = doc! {
            "done": true,
            "status": ReviewStatus::Done.as_str(),
            "metadata.updated_at": DateTime::now(),
        };
        if let Some(expires) = expires {
            set.insert("expires", expires);
        }

        self.completions(kind)
            .compare_and_set(
                doc! {
                    "user_id": user_id,
                    "quest_id": quest_id,
                    "done": { "$ne": true },
                },
                doc! { "$set": set },
            )
            .await
    }

    async fn set_completion_status(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        status: ReviewStatus,
    ) -> Result<bool> {
        self.completions(kind)
            .compare_and_set(
                doc! {
                    "user_id": user_id,
                    "quest_id": quest_id,
                    "done": { "$ne": true },
                },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }

    async fn count_done_for_campaign(&self, user_id: &str, campaign_id: &str) -> Result<u64> {
        self.campaign_quest_completed
            .count(doc! {
                "user_id": user_id,
                "campaign_id": campaign_id,
                "done": true,
            })
            .await
    }

    async fn purge_expired_completions(&self, now: DateTime) -> Result<usize> {
        // MongoDB's TTL monitor also removes these through the `expires`
        // index; the explicit purge keeps sweep behavior uniform across
        // ledger implementations and tightens the window.
        let mut removed = 0_usize;
        for collection in self.all_completion_collections() {
            let result = collection
                .inner()
                .delete_many(doc! { "expires": { "$lte": now } })
                .await
                .map_err(|e| EngagementError::Database(format!("Expiry purge failed: {}", e)))?;
            removed += result.deleted_count as usize;
        }
        if removed > 0 {
            debug!("Purged {} expired completion records", removed);
        }
        Ok(removed)
    }

    async fn submission(&self, submission_id: &str) -> Result<Option<SubmissionDoc>> {
        self.submissions
            .find_one(doc! { "submission_id": submission_id })
            .await
    }

    async fn submission_for(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<SubmissionDoc>> {
        self.submissions
            .find_one(doc! { "user_id": user_id, "quest_id": quest_id })
            .await
    }

    async fn insert_submission_if_absent(&self, submission: SubmissionDoc) -> Result<bool> {
        Ok(self.submissions.insert_if_absent(submission).await?.is_some())
    }

    async fn resubmit(&self, submission_id: &str, evidence_link: &str) -> Result<bool> {
        self.submissions
            .compare_and_set(
                doc! {
                    "submission_id": submission_id,
                    "status": ReviewStatus::Retry.as_str(),
                },
                doc! {
                    "$set": {
                        "status": ReviewStatus::Pending.as_str(),
                        "evidence_link": evidence_link,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }

    async fn set_submission_reviewed(
        &self,
        submission_id: &str,
        status: ReviewStatus,
        validated_by: &str,
    ) -> Result<bool> {
        self.submissions
            .compare_and_set(
                doc! {
                    "submission_id": submission_id,
                    "status": ReviewStatus::Pending.as_str(),
                },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "validated_by": validated_by,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }

    async fn campaign_completed(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> Result<Option<CampaignCompletedDoc>> {
        self.campaign_completed
            .find_one(doc! { "user_id": user_id, "campaign_id": campaign_id })
            .await
    }

    async fn insert_campaign_completed_if_absent(
        &self,
        record: CampaignCompletedDoc,
    ) -> Result<bool> {
        Ok(self
            .campaign_completed
            .insert_if_absent(record)
            .await?
            .is_some())
    }

    async fn set_claim_state(
        &self,
        user_id: &str,
        campaign_id: &str,
        claimed: bool,
        claim_pending: bool,
    ) -> Result<()> {
        self.campaign_completed
            .update_one(
                doc! { "user_id": user_id, "campaign_id": campaign_id },
                doc! {
                    "$set": {
                        "claimed": claimed,
                        "claim_pending": claim_pending,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn pending_claims(&self) -> Result<Vec<CampaignCompletedDoc>> {
        self.campaign_completed
            .find_many(doc! { "claim_pending": true })
            .await
    }
}
