//! Engagement service facade
//!
//! The inbound surface consumed by the HTTP layer (which lives outside this
//! crate). Wires the recorder, moderation engine, reward engine and campaign
//! aggregator over one ledger store and one claim gateway.

use bson::DateTime;
use std::sync::Arc;

use crate::campaigns::CampaignAggregator;
use crate::completion::CompletionRecorder;
use crate::db::LedgerStore;
use crate::gateway::ClaimGateway;
use crate::moderation::ModerationEngine;
use crate::rewards::RewardEngine;
use crate::types::{CompletionOutcome, Result, ReviewDecision};

/// Facade over the engagement core
pub struct EngagementService {
    recorder: Arc<CompletionRecorder>,
    moderation: ModerationEngine,
    rewards: Arc<RewardEngine>,
}

impl EngagementService {
    /// Wire the core over a ledger store and a claim gateway
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn ClaimGateway>) -> Self {
        let rewards = Arc::new(RewardEngine::new(ledger.clone(), gateway.clone()));
        let aggregator = Arc::new(CampaignAggregator::new(ledger.clone(), gateway));
        let recorder = Arc::new(CompletionRecorder::new(
            ledger.clone(),
            rewards.clone(),
            aggregator,
        ));
        let moderation = ModerationEngine::new(ledger, recorder.clone());

        Self {
            recorder,
            moderation,
            rewards,
        }
    }

    /// Submit evidence for a review-gated task
    pub async fn submit_evidence(
        &self,
        user_id: &str,
        quest_id: &str,
        evidence_link: &str,
    ) -> Result<crate::db::schemas::SubmissionDoc> {
        self.moderation
            .submit_evidence(user_id, quest_id, evidence_link)
            .await
    }

    /// Moderator decision on a pending submission
    pub async fn review_submission(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        moderator_id: &str,
    ) -> Result<()> {
        self.moderation
            .review(submission_id, decision, moderator_id)
            .await
    }

    /// Complete an auto-verifiable task
    pub async fn complete_auto_task(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<CompletionOutcome> {
        self.recorder.record_completion(user_id, quest_id).await
    }

    /// Start a delay-gated ecosystem quest; returns the instant the
    /// completion becomes claimable
    pub async fn start_timed_quest(&self, user_id: &str, quest_id: &str) -> Result<DateTime> {
        self.recorder.start_timed_quest(user_id, quest_id).await
    }

    /// External mint confirmation callback from the chain executor
    pub async fn confirm_mint(&self, user_id: &str, level: u32) -> Result<bool> {
        self.rewards.confirm_mint(user_id, level).await
    }
}
