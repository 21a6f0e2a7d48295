//! Completion recording
//!
//! Enforces at-most-once completion of a (user, task) pair and applies
//! reward accrual. The atomic claim on the completion record — an
//! insert-if-absent for fresh tasks, a compare-and-set for records created
//! earlier by a start action — is the sole point of mutual exclusion: the
//! reward mutation proceeds only for the caller that wins it.

use bson::DateTime;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::campaigns::CampaignAggregator;
use crate::db::schemas::{CompletionDoc, QuestDoc};
use crate::db::LedgerStore;
use crate::rewards::RewardEngine;
use crate::types::{CompletionOutcome, EngagementError, Result, SkipReason, TaskKind};

/// Records completions and applies reward accrual
pub struct CompletionRecorder {
    ledger: Arc<dyn LedgerStore>,
    rewards: Arc<RewardEngine>,
    aggregator: Arc<CampaignAggregator>,
}

impl CompletionRecorder {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        rewards: Arc<RewardEngine>,
        aggregator: Arc<CampaignAggregator>,
    ) -> Self {
        Self {
            ledger,
            rewards,
            aggregator,
        }
    }

    /// Record an auto-verifiable completion.
    ///
    /// Duplicate attempts (retried requests, double-clicks) are not errors:
    /// the losing caller gets `applied=false` with `AlreadyCompleted` and
    /// should present it as success. Evidence-based tasks are rejected here
    /// — they complete through moderation acceptance only.
    pub async fn record_completion(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<CompletionOutcome> {
        let quest = self.require_quest(quest_id).await?;
        self.require_user(user_id).await?;

        if quest.requires_review {
            return Err(EngagementError::Conflict(format!(
                "quest {} completes through evidence review",
                quest_id
            )));
        }

        let expires = recurring_expiry(&quest);
        let existing = self
            .ledger
            .completion(quest.task_kind, user_id, quest_id)
            .await?;

        let won = match existing {
            Some(record) if record.done => {
                debug!(user_id, quest_id, "Completion already recorded");
                return Ok(CompletionOutcome::skipped(SkipReason::AlreadyCompleted));
            }
            Some(record) => {
                // A not-done record exists: for timed quests this is the
                // start marker, and the gate must have elapsed
                if quest.is_timed() {
                    check_timer(&record, quest_id)?;
                }
                self.ledger
                    .mark_completion_done(quest.task_kind, user_id, quest_id, expires)
                    .await?
            }
            None => {
                if quest.is_timed() {
                    // Never started; the delay gate is unmet by definition
                    return Err(EngagementError::NotReady(format!(
                        "quest {} has not been started",
                        quest_id
                    )));
                }
                let mut record = CompletionDoc::done_now(user_id.to_string(), &quest);
                record.expires = expires;
                self.ledger.insert_completion_if_absent(record).await?
            }
        };

        if !won {
            // Lost the atomic claim to a concurrent duplicate
            debug!(user_id, quest_id, "Lost completion race, treating as already completed");
            return Ok(CompletionOutcome::skipped(SkipReason::AlreadyCompleted));
        }

        info!(user_id, quest_id, "Completion recorded");
        self.settle_reward(user_id, &quest).await?;

        Ok(CompletionOutcome::applied())
    }

    /// Start a delay-gated ecosystem quest, stamping the earliest instant
    /// its completion may be claimed. Returns that instant.
    pub async fn start_timed_quest(&self, user_id: &str, quest_id: &str) -> Result<DateTime> {
        let quest = self.require_quest(quest_id).await?;
        self.require_user(user_id).await?;

        let Some(duration_secs) = quest.duration_secs else {
            return Err(EngagementError::Conflict(format!(
                "quest {} is not delay-gated",
                quest_id
            )));
        };

        let timer =
            DateTime::from_millis(DateTime::now().timestamp_millis() + duration_secs * 1000);

        let record = CompletionDoc::started(user_id.to_string(), &quest, timer);
        if self.ledger.insert_completion_if_absent(record).await? {
            info!(user_id, quest_id, "Timed quest started");
            return Ok(timer);
        }

        // A record already exists: either the quest is done, or it was
        // started earlier and the original timer stands
        match self
            .ledger
            .completion(quest.task_kind, user_id, quest_id)
            .await?
        {
            Some(record) if record.done => Err(EngagementError::AlreadyCompleted(format!(
                "quest {} already completed",
                quest_id
            ))),
            Some(record) => record.timer.ok_or_else(|| {
                EngagementError::Conflict(format!("quest {} already in progress", quest_id))
            }),
            None => Err(EngagementError::Conflict(format!(
                "quest {} start raced a concurrent reset",
                quest_id
            ))),
        }
    }

    /// Shared post-claim path: accrue the reward, then re-evaluate the
    /// owning campaign. Used by both this recorder and moderation acceptance
    /// — the single code path that prevents double pay.
    pub(crate) async fn settle_reward(&self, user_id: &str, quest: &QuestDoc) -> Result<()> {
        self.rewards.apply_reward(user_id, quest).await?;

        if let Some(campaign_id) = quest.campaign_id.as_deref() {
            // Aggregation failures are logged, not surfaced: the completion
            // is already durable and the sweep picks up deferred claims
            if let Err(e) = self.aggregator.on_quest_completed(user_id, campaign_id).await {
                warn!(user_id, campaign_id, "Campaign aggregation failed: {}", e);
            }
        }

        Ok(())
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

/// Expiry stamp for recurring categories, None otherwise
pub(crate) fn recurring_expiry(quest: &QuestDoc) -> Option<DateTime> {
    quest.category.expiry_secs().map(|secs| {
        DateTime::from_millis(DateTime::now().timestamp_millis() + secs * 1000)
    })
}

/// Enforce the delay gate on a started timed quest
fn check_timer(record: &CompletionDoc, quest_id: &str) -> Result<()> {
    let Some(timer) = record.timer else {
        return Err(EngagementError::NotReady(format!(
            "quest {} has not been started",
            quest_id
        )));
    };
    if DateTime::now() < timer {
        return Err(EngagementError::NotReady(format!(
            "quest {} timer has not elapsed",
            quest_id
        )));
    }
    Ok(())
}

/// Spawn a background task that periodically removes expired recurring
/// completions, making those tasks completable again.
///
/// With the MongoDB ledger the TTL index does the same removal server-side;
/// the sweep keeps dev-mode behavior identical.
pub fn spawn_expiry_sweep(ledger: Arc<dyn LedgerStore>, interval: std::time::Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match ledger.purge_expired_completions(DateTime::now()).await {
                Ok(removed) if removed > 0 => {
                    debug!("Expiry sweep removed {} completion records", removed);
                }
                Ok(_) => {}
                Err(e) => warn!("Expiry sweep failed: {}", e),
            }
        }
    });
    info!("Completion expiry sweep started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::QuestCategory;

    #[test]
    fn test_recurring_expiry_only_for_recurring_categories() {
        let mut quest = QuestDoc {
            quest_id: "q".into(),
            category: QuestCategory::Social,
            ..Default::default()
        };
        assert!(recurring_expiry(&quest).is_none());

        quest.category = QuestCategory::Daily;
        let expires = recurring_expiry(&quest).unwrap();
        let delta = expires.timestamp_millis() - DateTime::now().timestamp_millis();
        assert!(delta > 23 * 3600 * 1000 && delta <= 24 * 3600 * 1000);
    }

    #[test]
    fn test_check_timer_gates_unelapsed() {
        let quest = QuestDoc {
            quest_id: "q".into(),
            task_kind: TaskKind::EcosystemQuest,
            ..Default::default()
        };
        let future = DateTime::from_millis(DateTime::now().timestamp_millis() + 60_000);
        let record = CompletionDoc::started("u".into(), &quest, future);
        assert!(matches!(
            check_timer(&record, "q"),
            Err(EngagementError::NotReady(_))
        ));

        let past = DateTime::from_millis(DateTime::now().timestamp_millis() - 1_000);
        let record = CompletionDoc::started("u".into(), &quest, past);
        assert!(check_timer(&record, "q").is_ok());
    }
}
