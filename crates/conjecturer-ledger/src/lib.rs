#![allow(clippy::must_use_candidate)] // Builders don't need must_use
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details

//! Run ledger
//!
//! Every evaluated candidate is appended to a JSONL file together with its
//! outcome, fitness and judge output. The ledger is the durable history of a
//! run: operator statistics are rebuilt from it on restart, parents are
//! drawn from it while the archive is empty, and the reporting commands read
//! it.

pub mod ledger;
pub mod record;

pub use ledger::{RunLedger, DEFAULT_LEDGER_FILE};
pub use record::LedgerRecord;

use thiserror::Error;

/// Errors from ledger storage
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
