//! Claim gateway boundary
//!
//! The chain executor that actually grants on-chain claim and NFT mint
//! eligibility is an external collaborator. This core calls each verb at
//! most once per logical trigger; the executor side must be idempotent,
//! since infrastructure above may retry delivery.

pub mod nats;
pub mod reconcile;

pub use nats::{NatsClaimGateway, CLAIM_SUBJECT, MINT_SUBJECT};
pub use reconcile::spawn_reconcile_task;

use async_trait::async_trait;

use crate::types::Result;

/// Outbound verbs consumed by the engagement core and implemented by the
/// external chain executor.
#[async_trait]
pub trait ClaimGateway: Send + Sync {
    /// Grant on-chain claim eligibility for a completed campaign
    async fn allow_claim(&self, user_id: &str, contract_address: &str) -> Result<()>;

    /// Grant NFT mint eligibility for a reached level
    async fn allow_mint(&self, level: u32, user_id: &str) -> Result<()>;
}
