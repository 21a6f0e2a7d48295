//! In-memory ledger store
//!
//! DashMap-backed implementation of the [`LedgerStore`] boundary, used in dev
//! mode and by the integration tests. Per-key entry locking gives the same
//! atomicity the MongoDB unique indexes give: insert-if-absent and
//! compare-and-set each resolve under a single shard lock, so concurrent
//! duplicate requests race exactly one winner.

use async_trait::async_trait;
use bson::DateTime;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::db::ledger::{Accrual, CompletionCounter, LedgerStore};
use crate::db::schemas::{
    CampaignCompletedDoc, CampaignDoc, CompletionDoc, QuestDoc, ReviewStatus, SubmissionDoc,
    UserDoc,
};
use crate::types::{EngagementError, Result, TaskKind};

/// Key for completion records: (collection family, user, task)
type CompletionKey = (TaskKind, String, String);

/// Key for campaign completions: (user, campaign)
type CampaignKey = (String, String);

/// In-memory ledger with concurrent access
#[derive(Default)]
pub struct MemoryLedger {
    users: DashMap<String, UserDoc>,
    quests: DashMap<String, QuestDoc>,
    campaigns: DashMap<String, CampaignDoc>,
    /// Submissions by submission_id
    submissions: DashMap<String, SubmissionDoc>,
    /// Index: (user_id, quest_id) -> submission_id
    submission_index: DashMap<(String, String), String>,
    completions: DashMap<CompletionKey, CompletionDoc>,
    campaign_completions: DashMap<CampaignKey, CampaignCompletedDoc>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user (user creation is owned by the auth subsystem; tests and
    /// dev mode stand in for it here)
    pub fn seed_user(&self, user: UserDoc) {
        self.users.insert(user.user_id.clone(), user);
    }

    /// Seed a quest definition
    pub fn seed_quest(&self, quest: QuestDoc) {
        self.quests.insert(quest.quest_id.clone(), quest);
    }

    /// Seed a campaign definition
    pub fn seed_campaign(&self, campaign: CampaignDoc) {
        self.campaigns.insert(campaign.campaign_id.clone(), campaign);
    }

    /// Counts of stored documents, for the startup log line
    pub fn stats(&self) -> MemoryLedgerStats {
        MemoryLedgerStats {
            users: self.users.len(),
            quests: self.quests.len(),
            completions: self.completions.len(),
            submissions: self.submissions.len(),
        }
    }
}

/// Statistics about the in-memory ledger
#[derive(Debug, Clone)]
pub struct MemoryLedgerStats {
    pub users: usize,
    pub quests: usize,
    pub completions: usize,
    pub submissions: usize,
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn apply_accrual(&self, user_id: &str, accrual: Accrual) -> Result<UserDoc> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngagementError::NotFound(format!("user {}", user_id)))?;

        user.xp += accrual.xp;
        user.trust_earned += accrual.trust;
        match accrual.counter {
            CompletionCounter::Quests => user.quests_completed += 1,
            CompletionCounter::Tasks => user.tasks_completed += 1,
        }
        user.metadata.updated_at = Some(DateTime::now());

        Ok(user.clone())
    }

    async fn reserve_mint(&self, user_id: &str, level: i32) -> Result<bool> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngagementError::NotFound(format!("user {}", user_id)))?;

        if user.badges.contains(&level) || user.pending_mints.contains(&level) {
            return Ok(false);
        }
        user.pending_mints.push(level);
        user.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn confirm_mint(&self, user_id: &str, level: i32) -> Result<bool> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngagementError::NotFound(format!("user {}", user_id)))?;

        if user.badges.contains(&level) {
            return Ok(false);
        }
        user.pending_mints.retain(|l| *l != level);
        user.badges.push(level);
        user.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn quest(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        Ok(self.quests.get(quest_id).map(|q| q.clone()))
    }

    async fn campaign(&self, campaign_id: &str) -> Result<Option<CampaignDoc>> {
        Ok(self.campaigns.get(campaign_id).map(|c| c.clone()))
    }

    async fn completion(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<CompletionDoc>> {
        let key = (kind, user_id.to_string(), quest_id.to_string());
        Ok(self.completions.get(&key).map(|c| c.clone()))
    }

    async fn insert_completion_if_absent(&self, mut record: CompletionDoc) -> Result<bool> {
        let key = (
            record.task_kind,
            record.user_id.clone(),
            record.quest_id.clone(),
        );
        match self.completions.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                record.metadata.created_at = Some(DateTime::now());
                record.metadata.updated_at = Some(DateTime::now());
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn mark_completion_done(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        expires: Option<DateTime>,
    ) -> Result<bool> {
        let key = (kind, user_id.to_string(), quest_id.to_string());
        let Some(mut record) = self.completions.get_mut(&key) else {
            return Ok(false);
        };
        if record.done {
            return Ok(false);
        }
        record.done = true;
        record.status = ReviewStatus::Done;
        if expires.is_some() {
            record.expires = expires;
        }
        record.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn set_completion_status(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        status: ReviewStatus,
    ) -> Result<bool> {
        let key = (kind, user_id.to_string(), quest_id.to_string());
        let Some(mut record) = self.completions.get_mut(&key) else {
            return Ok(false);
        };
        if record.done {
            return Ok(false);
        }
        record.status = status;
        record.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn count_done_for_campaign(&self, user_id: &str, campaign_id: &str) -> Result<u64> {
        let count = self
            .completions
            .iter()
            .filter(|entry| {
                entry.done
                    && entry.user_id == user_id
                    && entry.campaign_id.as_deref() == Some(campaign_id)
            })
            .count();
        Ok(count as u64)
    }

    async fn purge_expired_completions(&self, now: DateTime) -> Result<usize> {
        let expired: Vec<CompletionKey> = self
            .completions
            .iter()
            .filter(|entry| matches!(entry.expires, Some(expires) if expires <= now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            if self.completions.remove(&key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Purged {} expired completion records", removed);
        }
        Ok(removed)
    }

    async fn submission(&self, submission_id: &str) -> Result<Option<SubmissionDoc>> {
        Ok(self.submissions.get(submission_id).map(|s| s.clone()))
    }

    async fn submission_for(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<SubmissionDoc>> {
        let key = (user_id.to_string(), quest_id.to_string());
        let Some(submission_id) = self.submission_index.get(&key) else {
            return Ok(None);
        };
        Ok(self.submissions.get(submission_id.value()).map(|s| s.clone()))
    }

    async fn insert_submission_if_absent(&self, mut submission: SubmissionDoc) -> Result<bool> {
        let index_key = (submission.user_id.clone(), submission.quest_id.clone());
        match self.submission_index.entry(index_key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                submission.metadata.created_at = Some(DateTime::now());
                submission.metadata.updated_at = Some(DateTime::now());
                let submission_id = submission.submission_id.clone();
                self.submissions.insert(submission_id.clone(), submission);
                slot.insert(submission_id);
                Ok(true)
            }
        }
    }

    async fn resubmit(&self, submission_id: &str, evidence_link: &str) -> Result<bool> {
        let Some(mut submission) = self.submissions.get_mut(submission_id) else {
            return Ok(false);
        };
        if submission.status != ReviewStatus::Retry {
            return Ok(false);
        }
        submission.status = ReviewStatus::Pending;
        submission.evidence_link = evidence_link.to_string();
        submission.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn set_submission_reviewed(
        &self,
        submission_id: &str,
        status: ReviewStatus,
        validated_by: &str,
    ) -> Result<bool> {
        let Some(mut submission) = self.submissions.get_mut(submission_id) else {
            return Ok(false);
        };
        if submission.status != ReviewStatus::Pending {
            return Ok(false);
        }
        submission.status = status;
        submission.validated_by = Some(validated_by.to_string());
        submission.metadata.updated_at = Some(DateTime::now());
        Ok(true)
    }

    async fn campaign_completed(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> Result<Option<CampaignCompletedDoc>> {
        let key = (user_id.to_string(), campaign_id.to_string());
        Ok(self.campaign_completions.get(&key).map(|c| c.clone()))
    }

    async fn insert_campaign_completed_if_absent(
        &self,
        mut record: CampaignCompletedDoc,
    ) -> Result<bool> {
        let key = (record.user_id.clone(), record.campaign_id.clone());
        match self.campaign_completions.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                record.metadata.created_at = Some(DateTime::now());
                record.metadata.updated_at = Some(DateTime::now());
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn set_claim_state(
        &self,
        user_id: &str,
        campaign_id: &str,
        claimed: bool,
        claim_pending: bool,
    ) -> Result<()> {
        let key = (user_id.to_string(), campaign_id.to_string());
        if let Some(mut record) = self.campaign_completions.get_mut(&key) {
            record.claimed = claimed;
            record.claim_pending = claim_pending;
            record.metadata.updated_at = Some(DateTime::now());
        }
        Ok(())
    }

    async fn pending_claims(&self) -> Result<Vec<CampaignCompletedDoc>> {
        Ok(self
            .campaign_completions
            .iter()
            .filter(|entry| entry.claim_pending)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_completion_if_absent_races_one_winner() {
        let ledger = MemoryLedger::new();
        let quest = QuestDoc {
            quest_id: "q1".into(),
            ..Default::default()
        };

        let first = ledger
            .insert_completion_if_absent(CompletionDoc::done_now("u1".into(), &quest))
            .await
            .unwrap();
        let second = ledger
            .insert_completion_if_absent(CompletionDoc::done_now("u1".into(), &quest))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_mark_done_only_once() {
        let ledger = MemoryLedger::new();
        let quest = QuestDoc {
            quest_id: "q1".into(),
            ..Default::default()
        };
        ledger
            .insert_completion_if_absent(CompletionDoc::pending_review("u1".into(), &quest))
            .await
            .unwrap();

        assert!(ledger
            .mark_completion_done(TaskKind::Quest, "u1", "q1", None)
            .await
            .unwrap());
        assert!(!ledger
            .mark_completion_done(TaskKind::Quest, "u1", "q1", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired_completions() {
        let ledger = MemoryLedger::new();
        let quest = QuestDoc {
            quest_id: "daily".into(),
            ..Default::default()
        };
        let mut record = CompletionDoc::done_now("u1".into(), &quest);
        record.expires = Some(DateTime::from_millis(DateTime::now().timestamp_millis() - 1000));
        ledger.insert_completion_if_absent(record).await.unwrap();

        let removed = ledger
            .purge_expired_completions(DateTime::now())
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(ledger
            .completion(TaskKind::Quest, "u1", "daily")
            .await
            .unwrap()
            .is_none());
    }
}
