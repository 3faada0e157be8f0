//! Generated candidates

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::outcome::VerificationOutcome;
use crate::service::NegationRequest;

/// Hands out monotonically increasing candidate ids
#[derive(Debug, Default)]
pub struct CandidateIds(AtomicU64);

impl CandidateIds {
    /// Start counting at `first`
    pub fn starting_at(first: u64) -> Self {
        Self(AtomicU64::new(first))
    }

    /// Next unused id
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// A generated statement in its surrounding context
///
/// `statement` is a single declaration header ending in `:= by`; `context`
/// holds the imports and preceding declarations it elaborates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub context: String,
    pub statement: String,
    /// Set when the generated text could not be turned into a statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
    /// Goal reported for the `sorry` proof at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<VerificationOutcome>,
}

impl Candidate {
    pub fn new(id: u64, context: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            id,
            context: context.into(),
            statement: statement.into(),
            generation_error: None,
            goal: None,
            resolution: None,
        }
    }

    /// A candidate whose generation already failed
    pub fn failed(id: u64, context: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            generation_error: Some(error.into()),
            ..Self::new(id, context, String::new())
        }
    }

    /// Context followed by the statement header
    pub fn code(&self) -> String {
        Self::join(&self.context, &self.statement)
    }

    /// Statement and context, kept apart, for negation
    pub fn negation_request(&self) -> NegationRequest {
        NegationRequest::new(self.context.clone(), self.statement.clone())
    }

    /// Same context with a different statement
    pub fn code_with_statement(&self, statement: &str) -> String {
        Self::join(&self.context, statement)
    }

    pub(crate) fn join(context: &str, statement: &str) -> String {
        let context = context.trim_end();
        if context.is_empty() {
            statement.to_string()
        } else {
            format!("{context}\n\n{statement}")
        }
    }

    /// Declared name of the statement (`theorem foo ...` gives `foo`)
    pub fn name(&self) -> Option<&str> {
        let mut words = self.statement.split_whitespace();
        while let Some(word) = words.next() {
            if matches!(word, "theorem" | "lemma") {
                return words.next();
            }
        }
        None
    }

    /// Outcome recorded by the cascade
    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.resolution.as_ref()
    }

    /// Whether the cascade already classified this candidate
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Proof retained by the cascade
    pub fn proof(&self) -> Option<&str> {
        self.resolution.as_ref().and_then(VerificationOutcome::proof)
    }

    /// Record the outcome; a second call leaves the first outcome in place
    ///
    /// Returns whether the outcome was recorded.
    pub fn resolve(&mut self, outcome: VerificationOutcome) -> bool {
        if self.resolution.is_some() {
            return false;
        }
        self.resolution = Some(outcome);
        true
    }
}
