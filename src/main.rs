//! Questline - completion, moderation and reward engine

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use questline::{
    completion::spawn_expiry_sweep,
    config::Args,
    db::{LedgerStore, MemoryLedger, MongoClient, MongoLedger},
    gateway::{spawn_reconcile_task, ClaimGateway, NatsClaimGateway},
    service::EngagementService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("questline={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Questline - engagement engine");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("NATS: {}", args.nats.nats_url);
    info!("Reconcile interval: {}s", args.reconcile_interval_secs);
    info!("======================================");

    // Connect the ledger store (MongoDB, or in-memory in dev mode)
    let ledger: Arc<dyn LedgerStore> =
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                let ledger = MongoLedger::new(&client).await?;
                info!("MongoDB ledger ready");
                Arc::new(ledger)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB unavailable (dev mode, using in-memory ledger): {}", e);
                    Arc::new(MemoryLedger::new())
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    // Connect the claim gateway
    let gateway: Arc<dyn ClaimGateway> =
        match NatsClaimGateway::connect(&args.nats, &format!("questline-{}", args.node_id)).await {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                // Completions keep working without the executor; claim
                // grants defer until the reconciliation sweep can reach it
                if args.dev_mode {
                    warn!("NATS unavailable (dev mode, claims will defer): {}", e);
                    Arc::new(DeferringGateway)
                } else {
                    error!("NATS connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    // Background sweeps
    spawn_reconcile_task(
        ledger.clone(),
        gateway.clone(),
        Duration::from_secs(args.reconcile_interval_secs),
    );
    spawn_expiry_sweep(
        ledger.clone(),
        Duration::from_secs(args.expiry_sweep_interval_secs),
    );

    // The HTTP layer mounts on this facade out-of-process; the daemon keeps
    // the sweeps alive
    let _service = EngagementService::new(ledger, gateway);
    info!("Engagement service ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}

/// Dev-mode stand-in when no executor is reachable: every grant defers
struct DeferringGateway;

#[async_trait::async_trait]
impl ClaimGateway for DeferringGateway {
    async fn allow_claim(&self, _user_id: &str, _contract_address: &str) -> questline::Result<()> {
        Err(questline::EngagementError::ClaimGatewayUnavailable(
            "no chain executor configured".into(),
        ))
    }

    async fn allow_mint(&self, _level: u32, _user_id: &str) -> questline::Result<()> {
        Err(questline::EngagementError::ClaimGatewayUnavailable(
            "no chain executor configured".into(),
        ))
    }
}
