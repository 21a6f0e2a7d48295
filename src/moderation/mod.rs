//! Submission moderation
//!
//! State machine for tasks that require human review of submitted evidence.
//! A submission moves Pending -> Done (terminal) or Pending -> Retry, and a
//! re-submission moves Retry -> Pending. Only Pending submissions are
//! actionable by moderators.
//!
//! Evidence correctness (the submission) is kept separate from reward
//! application (the completion record) so the same completion record backs
//! auto-verified and human-verified tasks; acceptance funnels into the same
//! settle path the recorder uses.

use std::sync::Arc;
use tracing::{info, warn};

use crate::completion::CompletionRecorder;
use crate::db::schemas::{CompletionDoc, QuestDoc, ReviewStatus, SubmissionDoc};
use crate::db::LedgerStore;
use crate::types::{EngagementError, Result, ReviewDecision};

/// Routes evidence submissions through moderator review
pub struct ModerationEngine {
    ledger: Arc<dyn LedgerStore>,
    recorder: Arc<CompletionRecorder>,
}

impl ModerationEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, recorder: Arc<CompletionRecorder>) -> Self {
        Self { ledger, recorder }
    }

    /// Submit evidence for a review-gated task.
    ///
    /// First submission creates the Pending submission and its linked
    /// not-done completion record. Submitting over a Retry is the one legal
    /// re-submission path and resets it to Pending with the fresh evidence.
    pub async fn submit_evidence(
        &self,
        user_id: &str,
        quest_id: &str,
        evidence_link: &str,
    ) -> Result<SubmissionDoc> {
        let quest = self.require_quest(quest_id).await?;
        self.require_user(user_id).await?;

        if !quest.requires_review {
            return Err(EngagementError::Conflict(format!(
                "quest {} does not take evidence submissions",
                quest_id
            )));
        }

        // Terminal completions short-circuit before any submission churn
        if let Some(record) = self
            .ledger
            .completion(quest.task_kind, user_id, quest_id)
            .await?
        {
            if record.done {
                return Err(EngagementError::AlreadyCompleted(format!(
                    "quest {} already completed",
                    quest_id
                )));
            }
        }

        match self.ledger.submission_for(user_id, quest_id).await? {
            None => self.create_submission(user_id, &quest, evidence_link).await,
            Some(submission) => match submission.status {
                ReviewStatus::Pending => Err(EngagementError::Conflict(format!(
                    "submission {} is awaiting review",
                    submission.submission_id
                ))),
                ReviewStatus::Done => Err(EngagementError::AlreadyCompleted(format!(
                    "quest {} already completed",
                    quest_id
                ))),
                ReviewStatus::Retry => {
                    self.resubmit(&submission, &quest, user_id, evidence_link)
                        .await
                }
            },
        }
    }

    /// Review a pending submission.
    ///
    /// The submission's own Pending -> reviewed transition is the atomic
    /// claim between concurrent moderators; the completion record is
    /// validated before it, and only the accept that wins both writes
    /// settles the reward — the guard against accepting twice.
    pub async fn review(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        moderator_id: &str,
    ) -> Result<()> {
        let submission = self
            .ledger
            .submission(submission_id)
            .await?
            .ok_or_else(|| {
                EngagementError::NotFound(format!("submission {}", submission_id))
            })?;

        if submission.status != ReviewStatus::Pending {
            return Err(EngagementError::Conflict(format!(
                "submission {} is {}, only pending submissions are reviewable",
                submission_id,
                submission.status.as_str()
            )));
        }

        let moderator = self.moderator_display(moderator_id).await?;

        // Validate the linked completion record before mutating anything:
        // a submission and its record are never accepted twice
        let record = self
            .ledger
            .completion(submission.task_kind, &submission.user_id, &submission.quest_id)
            .await?
            .ok_or_else(|| {
                EngagementError::NotFound(format!(
                    "completion record for submission {}",
                    submission_id
                ))
            })?;
        if record.done {
            return Err(EngagementError::Conflict(format!(
                "submission {} already has a completed record",
                submission_id
            )));
        }

        match decision {
            ReviewDecision::Accept => self.accept(&submission, &moderator).await,
            ReviewDecision::Reject => self.reject(&submission, &moderator).await,
        }
    }

    async fn accept(&self, submission: &SubmissionDoc, moderator: &str) -> Result<()> {
        let quest = self.require_quest(&submission.quest_id).await?;

        // Atomic claim between concurrent reviewers
        let won_submission = self
            .ledger
            .set_submission_reviewed(&submission.submission_id, ReviewStatus::Done, moderator)
            .await?;
        if !won_submission {
            return Err(EngagementError::Conflict(format!(
                "submission {} was reviewed concurrently",
                submission.submission_id
            )));
        }

        let expires = crate::completion::recurring_expiry(&quest);
        let won_record = self
            .ledger
            .mark_completion_done(
                submission.task_kind,
                &submission.user_id,
                &submission.quest_id,
                expires,
            )
            .await?;
        if !won_record {
            // The record was finished through another path after our check;
            // skip accrual rather than pay twice
            warn!(
                submission_id = %submission.submission_id,
                "Completion record already done at accept time, skipping accrual"
            );
            return Ok(());
        }

        info!(
            submission_id = %submission.submission_id,
            user_id = %submission.user_id,
            quest_id = %submission.quest_id,
            moderator,
            "Submission accepted"
        );

        self.recorder
            .settle_reward(&submission.user_id, &quest)
            .await
    }

    async fn reject(&self, submission: &SubmissionDoc, moderator: &str) -> Result<()> {
        let won = self
            .ledger
            .set_submission_reviewed(&submission.submission_id, ReviewStatus::Retry, moderator)
            .await?;
        if !won {
            return Err(EngagementError::Conflict(format!(
                "submission {} was reviewed concurrently",
                submission.submission_id
            )));
        }

        self.ledger
            .set_completion_status(
                submission.task_kind,
                &submission.user_id,
                &submission.quest_id,
                ReviewStatus::Retry,
            )
            .await?;

        info!(
            submission_id = %submission.submission_id,
            user_id = %submission.user_id,
            quest_id = %submission.quest_id,
            moderator,
            "Submission rejected, awaiting re-submission"
        );

        Ok(())
    }

    async fn create_submission(
        &self,
        user_id: &str,
        quest: &QuestDoc,
        evidence_link: &str,
    ) -> Result<SubmissionDoc> {
        let submission = SubmissionDoc::new(
            uuid::Uuid::new_v4().to_string(),
            user_id.to_string(),
            quest.quest_id.clone(),
            quest.task_kind,
            evidence_link.to_string(),
            quest.campaign_id.clone().unwrap_or_default(),
        );

        if !self
            .ledger
            .insert_submission_if_absent(submission.clone())
            .await?
        {
            // A concurrent submit won the unique (user, task) slot
            return Err(EngagementError::Conflict(format!(
                "submission for quest {} already exists",
                quest.quest_id
            )));
        }

        // The linked not-done record; if a start action or earlier submit
        // already created it, that record stands
        self.ledger
            .insert_completion_if_absent(CompletionDoc::pending_review(
                user_id.to_string(),
                quest,
            ))
            .await?;

        info!(
            submission_id = %submission.submission_id,
            user_id,
            quest_id = %quest.quest_id,
            "Evidence submitted for review"
        );

        Ok(submission)
    }

    async fn resubmit(
        &self,
        submission: &SubmissionDoc,
        quest: &QuestDoc,
        user_id: &str,
        evidence_link: &str,
    ) -> Result<SubmissionDoc> {
        if !self
            .ledger
            .resubmit(&submission.submission_id, evidence_link)
            .await?
        {
            return Err(EngagementError::Conflict(format!(
                "submission {} is no longer awaiting re-submission",
                submission.submission_id
            )));
        }

        // Mirror the reset on the completion record
        self.ledger
            .set_completion_status(
                quest.task_kind,
                user_id,
                &quest.quest_id,
                ReviewStatus::Pending,
            )
            .await?;

        info!(
            submission_id = %submission.submission_id,
            user_id,
            quest_id = %quest.quest_id,
            "Evidence re-submitted for review"
        );

        self.ledger
            .submission(&submission.submission_id)
            .await?
            .ok_or_else(|| {
                EngagementError::Internal(format!(
                    "submission {} vanished after re-submission",
                    submission.submission_id
                ))
            })
    }

    /// Display name recorded as the reviewing moderator
    async fn moderator_display(&self, moderator_id: &str) -> Result<String> {
        let moderator = self
            .ledger
            .user(moderator_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound(format!("moderator {}", moderator_id)))?;
        if moderator.display_name.is_empty() {
            Ok(moderator.user_id)
        } else {
            Ok(moderator.display_name)
        }
    }

    async fn require_quest(&self, quest_id: &str) -> Result<QuestDoc> {
        self.ledger
            .quest(quest_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound(format!("quest {}", quest_id)))
    }

    async fn require_user(&self, user_id: &str) -> Result<()> {
        self.ledger
            .user(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| EngagementError::NotFound(format!("user {}", user_id)))
    }
}
