//! Database layer
//!
//! MongoDB wrapper, document schemas, and the ledger-store boundary with its
//! two implementations (MongoDB and in-memory).

pub mod ledger;
pub mod memory;
pub mod mongo;
pub mod mongo_ledger;
pub mod schemas;

pub use ledger::{Accrual, CompletionCounter, LedgerStore};
pub use memory::{MemoryLedger, MemoryLedgerStats};
pub use mongo::{MongoClient, MongoCollection};
pub use mongo_ledger::MongoLedger;
