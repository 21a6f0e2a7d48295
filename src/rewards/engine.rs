//! Reward engine
//!
//! The single accrual path shared by auto-verified completions and
//! moderation accepts. Applies XP/trust to the user document, recomputes the
//! level, and issues at most one mint-eligibility call per (user, level).

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::ledger::{Accrual, CompletionCounter};
use crate::db::schemas::{QuestDoc, UserDoc};
use crate::db::LedgerStore;
use crate::gateway::ClaimGateway;
use crate::rewards::levels::level_for;
use crate::types::Result;

/// Applies reward accrual and mint eligibility
pub struct RewardEngine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn ClaimGateway>,
}

impl RewardEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn ClaimGateway>) -> Self {
        Self { ledger, gateway }
    }

    /// Apply a quest's declared reward to its completing user.
    ///
    /// Both completion entry points (auto-verified recording and moderated
    /// acceptance) land here; the caller must already hold the won atomic
    /// claim on the completion record, which is what makes this at-most-once
    /// per (user, task).
    pub async fn apply_reward(&self, user_id: &str, quest: &QuestDoc) -> Result<UserDoc> {
        let accrual = Accrual {
            xp: quest.reward_xp,
            trust: quest.reward_trust,
            counter: CompletionCounter::for_kind(quest.task_kind),
        };

        let user = self.ledger.apply_accrual(user_id, accrual).await?;
        debug!(
            user_id,
            quest_id = %quest.quest_id,
            xp = quest.reward_xp,
            trust = quest.reward_trust,
            total_xp = user.xp,
            "Applied reward accrual"
        );

        self.check_mint_eligibility(&user).await;

        Ok(user)
    }

    /// Issue the mint-eligibility hook when the user's level has outgrown
    /// their badge set.
    ///
    /// The atomic reserve on the pending-mint set is the at-most-once guard:
    /// concurrent accruals landing in the same tier race it and exactly one
    /// issues the gateway call. Level 0 never mints.
    async fn check_mint_eligibility(&self, user: &UserDoc) {
        let level = level_for(user.xp) as i32;
        if level == 0 || user.mint_in_flight_or_done(level) {
            return;
        }

        let reserved = match self.ledger.reserve_mint(&user.user_id, level).await {
            Ok(reserved) => reserved,
            Err(e) => {
                warn!(user_id = %user.user_id, level, "Mint reservation failed: {}", e);
                return;
            }
        };
        if !reserved {
            // Another accrual in the same tier got there first
            return;
        }

        info!(user_id = %user.user_id, level, "User reached level {}, requesting badge mint", level);

        // Fire-and-record: a gateway failure must never fail or roll back the
        // completion that earned the level. The reservation stays in place so
        // the call is not reissued on the next unrelated accrual.
        if let Err(e) = self.gateway.allow_mint(level as u32, &user.user_id).await {
            warn!(
                user_id = %user.user_id,
                level,
                "Mint eligibility call failed, awaiting executor recovery: {}",
                e
            );
        }
    }

    /// Record an external mint confirmation, moving the level from the
    /// pending set into the badge set. Returns whether the badge was newly
    /// recorded.
    pub async fn confirm_mint(&self, user_id: &str, level: u32) -> Result<bool> {
        let added = self.ledger.confirm_mint(user_id, level as i32).await?;
        if added {
            info!(user_id, level, "Badge mint confirmed");
        } else {
            debug!(user_id, level, "Badge mint already confirmed");
        }
        Ok(added)
    }
}
