//! Error types for the search loop

use conjecturer_archive::ArchiveError;
use conjecturer_cascade::{CascadeError, ServiceError};
use conjecturer_ledger::LedgerError;
use conjecturer_scheduler::SchedulerError;
use thiserror::Error;

/// Errors that abort a search iteration
#[derive(Error, Debug)]
pub enum SearchError {
    /// Archive configuration or persistence failed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Ledger read or append failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Operator catalogue persistence failed
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Verification cascade aborted
    #[error("Cascade error: {0}")]
    Cascade(#[from] CascadeError),

    /// Generation or judge service failed
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A generation or judge payload broke its contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;
