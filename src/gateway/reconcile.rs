//! Claim reconciliation sweep
//!
//! Campaign completions whose gateway call was deferred (executor
//! unreachable, or the campaign had no deployed contract yet) carry a
//! `claim_pending` flag. This sweep re-drives only the gateway call for
//! those records — never the user-facing completion logic, so reward
//! accrual cannot be repeated by a retry.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::LedgerStore;
use crate::gateway::ClaimGateway;

/// One reconciliation pass. Returns how many deferred claims were resolved.
pub async fn reconcile_pending_claims(
    ledger: &Arc<dyn LedgerStore>,
    gateway: &Arc<dyn ClaimGateway>,
) -> usize {
    let pending = match ledger.pending_claims().await {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Reconciliation scan failed: {}", e);
            return 0;
        }
    };

    let mut resolved = 0;
    for record in pending {
        let campaign = match ledger.campaign(&record.campaign_id).await {
            Ok(Some(campaign)) => campaign,
            Ok(None) => {
                warn!(
                    campaign_id = %record.campaign_id,
                    "Deferred claim references unknown campaign"
                );
                continue;
            }
            Err(e) => {
                warn!(campaign_id = %record.campaign_id, "Campaign lookup failed: {}", e);
                continue;
            }
        };

        // Still no deployed contract: leave the flag for a later pass
        let Some(contract_address) = campaign.contract_address.as_deref() else {
            debug!(
                campaign_id = %record.campaign_id,
                "Campaign contract not deployed yet, claim stays deferred"
            );
            continue;
        };

        match gateway.allow_claim(&record.user_id, contract_address).await {
            Ok(()) => {
                if let Err(e) = ledger
                    .set_claim_state(&record.user_id, &record.campaign_id, true, false)
                    .await
                {
                    warn!(
                        user_id = %record.user_id,
                        campaign_id = %record.campaign_id,
                        "Failed to clear claim_pending flag: {}",
                        e
                    );
                    continue;
                }
                info!(
                    user_id = %record.user_id,
                    campaign_id = %record.campaign_id,
                    "Deferred claim grant issued"
                );
                resolved += 1;
            }
            Err(e) => {
                warn!(
                    user_id = %record.user_id,
                    campaign_id = %record.campaign_id,
                    "Gateway still unavailable for deferred claim: {}",
                    e
                );
            }
        }
    }

    resolved
}

/// Spawn a background task that periodically re-drives deferred claims
pub fn spawn_reconcile_task(
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn ClaimGateway>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let resolved = reconcile_pending_claims(&ledger, &gateway).await;
            if resolved > 0 {
                info!("Claim reconciliation: resolved {} deferred claims", resolved);
            }
        }
    });
    info!("Claim reconciliation task started");
}
