//! Questline - completion, moderation and reward engine
//!
//! The state machine behind the Questline engagement platform: users
//! complete quests and campaign tasks to earn XP, tiered levels and
//! token/NFT rewards, moderators review evidence submissions, and fully
//! completed campaigns unlock an on-chain claim.
//!
//! ## Components
//!
//! - **Ledger store**: document-store boundary (MongoDB or in-memory)
//! - **Completion recorder**: at-most-once completion and reward accrual
//! - **Moderation engine**: pending/done/retry review lifecycle
//! - **Reward engine**: XP -> level mapping and badge-mint eligibility
//! - **Campaign aggregator**: full-completion detection and claim unlock
//! - **Claim gateway**: NATS boundary to the external chain executor

pub mod campaigns;
pub mod completion;
pub mod config;
pub mod db;
pub mod gateway;
pub mod moderation;
pub mod rewards;
pub mod service;
pub mod types;

pub use config::Args;
pub use service::EngagementService;
pub use types::{EngagementError, Result};
