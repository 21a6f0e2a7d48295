//! Configuration for the engagement daemon
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use uuid::Uuid;

/// Questline - completion, moderation and reward engine
#[derive(Parser, Debug, Clone)]
#[command(name = "questline")]
#[command(about = "Completion, moderation and reward engine for Questline")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Enable development mode (falls back to the in-memory ledger when
    /// MongoDB or NATS are unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "questline")]
    pub mongodb_db: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Interval between claim reconciliation sweeps, in seconds
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "300")]
    pub reconcile_interval_secs: u64,

    /// Interval between recurring-quest expiry sweeps, in seconds
    ///
    /// Only used with the in-memory ledger; MongoDB handles expiry through
    /// a TTL index on the completion collections.
    #[arg(long, env = "EXPIRY_SWEEP_INTERVAL_SECS", default_value = "60")]
    pub expiry_sweep_interval_secs: u64,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.reconcile_interval_secs == 0 {
            return Err("RECONCILE_INTERVAL_SECS must be greater than zero".to_string());
        }
        if self.expiry_sweep_interval_secs == 0 {
            return Err("EXPIRY_SWEEP_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(())
    }
}
