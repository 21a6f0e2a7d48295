//! NATS-backed claim gateway
//!
//! Publishes claim and mint eligibility messages for the chain executor.
//! Fire-and-record: delivery is one-way, and the executor reports mint
//! outcomes back through the `confirm_mint` inbound operation.

use async_nats::ConnectOptions;
use async_trait::async_trait;
use bson::DateTime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NatsArgs;
use crate::gateway::ClaimGateway;
use crate::types::{EngagementError, Result};

/// Subject the chain executor consumes claim eligibility grants on
pub const CLAIM_SUBJECT: &str = "chain.claim.allow";

/// Subject the chain executor consumes mint eligibility grants on
pub const MINT_SUBJECT: &str = "chain.mint.allow";

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Claim eligibility message
#[derive(Debug, Serialize, Deserialize)]
pub struct AllowClaimMessage {
    pub user_id: String,
    pub contract_address: String,
    /// Millisecond timestamp the grant was issued at
    pub issued_at: i64,
}

/// Mint eligibility message
#[derive(Debug, Serialize, Deserialize)]
pub struct AllowMintMessage {
    pub user_id: String,
    pub level: u32,
    /// Millisecond timestamp the grant was issued at
    pub issued_at: i64,
}

/// Claim gateway over NATS
#[derive(Clone)]
pub struct NatsClaimGateway {
    client: async_nats::Client,
}

impl NatsClaimGateway {
    /// Connect to NATS
    pub async fn connect(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| EngagementError::Gateway(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self { client })
    }

    /// Wrap an already-connected NATS client
    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }

    async fn publish_json<T: Serialize>(&self, subject: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(subject.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| {
                EngagementError::ClaimGatewayUnavailable(format!("Publish failed: {}", e))
            })?;
        // Flush so a dead connection surfaces here, not at an arbitrary
        // later publish
        self.client.flush().await.map_err(|e| {
            EngagementError::ClaimGatewayUnavailable(format!("Flush failed: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ClaimGateway for NatsClaimGateway {
    async fn allow_claim(&self, user_id: &str, contract_address: &str) -> Result<()> {
        let message = AllowClaimMessage {
            user_id: user_id.to_string(),
            contract_address: contract_address.to_string(),
            issued_at: DateTime::now().timestamp_millis(),
        };
        self.publish_json(CLAIM_SUBJECT, &message).await?;
        debug!(user_id, contract_address, "Issued claim eligibility grant");
        Ok(())
    }

    async fn allow_mint(&self, level: u32, user_id: &str) -> Result<()> {
        let message = AllowMintMessage {
            user_id: user_id.to_string(),
            level,
            issued_at: DateTime::now().timestamp_millis(),
        };
        self.publish_json(MINT_SUBJECT, &message).await?;
        debug!(user_id, level, "Issued mint eligibility grant");
        Ok(())
    }
}
