//! External service traits
//!
//! The cascade talks to two collaborators: a Lean verification server and a
//! proof-completion model. Implementations live outside this crate (HTTP
//! adapters in the CLI, mocks in tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::ProtocolError;
use crate::candidate::Candidate;
use crate::response::CheckResult;

/// Errors raised by service adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Request could not be sent or the connection failed
    #[error("Transport error: {0}")]
    Transport(String),
    /// Server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Reply body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// Service is not configured
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// Adapter received a reply that breaks the batch contract
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One piece of Lean source submitted for checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub code: String,
}

impl Snippet {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// A statement to negate, with the context it elaborates against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegationRequest {
    pub context: String,
    pub statement: String,
}

impl NegationRequest {
    pub fn new(context: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            statement: statement.into(),
        }
    }

    /// Context followed by the statement
    pub fn source(&self) -> String {
        Candidate::join(&self.context, &self.statement)
    }
}

/// Lean verification server
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Check a batch of snippets, one result per snippet id
    async fn check(&self, snippets: &[Snippet]) -> Result<Vec<CheckResult>, ServiceError>;

    /// Negate each statement
    ///
    /// One reply per request, in order: a single declaration header ending
    /// in `:= by`, or `None` when the server could not build the negation.
    /// Misaddressed batch replies surface as [`ServiceError::Protocol`].
    async fn negate(
        &self,
        requests: &[NegationRequest],
    ) -> Result<Vec<Option<String>>, ServiceError>;
}

/// Proof-completion model
#[async_trait]
pub trait ProverService: Send + Sync {
    /// Sample `k` proof completions per statement, order preserving
    async fn complete(&self, sources: &[String], k: usize)
        -> Result<Vec<Vec<String>>, ServiceError>;
}
