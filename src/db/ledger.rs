//! Ledger store boundary
//!
//! The document store holding users, quests, submissions and completion
//! records is an external collaborator: it offers per-document atomicity but
//! no cross-document transactions. Everything the core needs from it is
//! behind this trait, and the two atomic primitives — insert-if-absent on a
//! unique key, and per-document compare-and-set — are the only points of
//! mutual exclusion the state machine relies on.
//!
//! Two implementations ship: [`MongoLedger`](crate::db::MongoLedger) for
//! production and [`MemoryLedger`](crate::db::MemoryLedger) for dev mode and
//! tests.

use async_trait::async_trait;
use bson::DateTime;

use crate::db::schemas::{
    CampaignCompletedDoc, CampaignDoc, CompletionDoc, QuestDoc, ReviewStatus, SubmissionDoc,
    UserDoc,
};
use crate::types::{Result, TaskKind};

/// Per-call accrual applied to a user document in one atomic write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub xp: i64,
    pub trust: i64,
    /// Which counter the completion bumps
    pub counter: CompletionCounter,
}

/// Which per-user counter a completion increments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCounter {
    /// Ecosystem-wide quests
    Quests,
    /// Campaign and hub tasks
    Tasks,
}

impl CompletionCounter {
    /// Counter for a task kind
    pub fn for_kind(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Quest | TaskKind::EcosystemQuest => CompletionCounter::Quests,
            TaskKind::CampaignQuest | TaskKind::MiniQuest => CompletionCounter::Tasks,
        }
    }
}

/// Document store boundary used by the engagement core.
///
/// All writes promised atomic here are atomic per document; the core never
/// asks for a cross-document transaction.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- users ---

    /// Load a user by platform identifier
    async fn user(&self, user_id: &str) -> Result<Option<UserDoc>>;

    /// Atomically apply a reward accrual to the user document and return the
    /// updated document. XP and trust only ever increase.
    async fn apply_accrual(&self, user_id: &str, accrual: Accrual) -> Result<UserDoc>;

    /// Atomically add `level` to the user's pending mint set. Returns true
    /// for the caller that actually added it — the at-most-once guard on
    /// `allow_mint` per (user, level).
    async fn reserve_mint(&self, user_id: &str, level: i32) -> Result<bool>;

    /// Record an external mint confirmation: move `level` from the pending
    /// set into the badge set. Returns true if the badge was newly added.
    async fn confirm_mint(&self, user_id: &str, level: i32) -> Result<bool>;

    // --- task definitions (read-only to this core) ---

    /// Load a quest definition
    async fn quest(&self, quest_id: &str) -> Result<Option<QuestDoc>>;

    /// Load a campaign definition
    async fn campaign(&self, campaign_id: &str) -> Result<Option<CampaignDoc>>;

    // --- completion records ---

    /// Load the completion record for a (user, task) pair
    async fn completion(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<CompletionDoc>>;

    /// Atomically insert a completion record unless one already exists for
    /// the (user, task) pair. Returns true for the winning caller.
    async fn insert_completion_if_absent(&self, record: CompletionDoc) -> Result<bool>;

    /// Atomically flip an existing not-done completion record to done,
    /// optionally stamping an expiry for recurring categories. Returns true
    /// for the caller that won the flip.
    async fn mark_completion_done(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        expires: Option<DateTime>,
    ) -> Result<bool>;

    /// Set the mirrored review status on a not-done completion record.
    /// Returns true if a record was updated.
    async fn set_completion_status(
        &self,
        kind: TaskKind,
        user_id: &str,
        quest_id: &str,
        status: ReviewStatus,
    ) -> Result<bool>;

    /// Count done completion records for (user, campaign)
    async fn count_done_for_campaign(&self, user_id: &str, campaign_id: &str) -> Result<u64>;

    /// Remove completion records whose `expires` instant has passed, making
    /// the owning recurring tasks completable again. Returns how many were
    /// removed.
    async fn purge_expired_completions(&self, now: DateTime) -> Result<usize>;

    // --- submissions ---

    /// Load a submission by identifier
    async fn submission(&self, submission_id: &str) -> Result<Option<SubmissionDoc>>;

    /// Load the submission for a (user, task) pair
    async fn submission_for(&self, user_id: &str, quest_id: &str)
        -> Result<Option<SubmissionDoc>>;

    /// Atomically insert a submission unless one exists for the (user, task)
    /// pair. Returns true for the winning caller.
    async fn insert_submission_if_absent(&self, submission: SubmissionDoc) -> Result<bool>;

    /// Re-submission: atomically move a Retry submission back to Pending with
    /// fresh evidence. Returns true if the submission was in Retry.
    async fn resubmit(&self, submission_id: &str, evidence_link: &str) -> Result<bool>;

    /// Atomically move a Pending submission to its reviewed status, stamping
    /// the moderator identity. Returns true if the submission was Pending.
    async fn set_submission_reviewed(
        &self,
        submission_id: &str,
        status: ReviewStatus,
        validated_by: &str,
    ) -> Result<bool>;

    // --- campaign completions ---

    /// Load the campaign completion record for (user, campaign)
    async fn campaign_completed(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> Result<Option<CampaignCompletedDoc>>;

    /// Atomically insert a campaign completion unless one exists for the
    /// (user, campaign) pair. Returns true for the winning caller — the
    /// re-entrancy guard against concurrent last-quest completions.
    async fn insert_campaign_completed_if_absent(
        &self,
        record: CampaignCompletedDoc,
    ) -> Result<bool>;

    /// Record the outcome of the claim-gateway call for (user, campaign)
    async fn set_claim_state(
        &self,
        user_id: &str,
        campaign_id: &str,
        claimed: bool,
        claim_pending: bool,
    ) -> Result<()>;

    /// Campaign completions whose gateway call is still owed
    async fn pending_claims(&self) -> Result<Vec<CampaignCompletedDoc>>;
}
