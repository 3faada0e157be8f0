//! Generation and judging services
//!
//! The verifier and prover traits live in `conjecturer-cascade`; the two
//! model-backed collaborators the search loop needs on top are defined here.

use async_trait::async_trait;
use conjecturer_cascade::ServiceError;
use conjecturer_scheduler::{OperatorDescriptor, NOVEL_OPERATOR};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::fitness::JudgedCandidate;

/// Input for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub context_id: String,
    /// Lean source the statements must elaborate against
    pub context: String,
    /// Operator to apply; the novel arm asks for a new one
    pub operator_hint: OperatorDescriptor,
    /// Statement to mutate, when a parent was selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_statement: Option<String>,
}

/// One generated statement, or the reason none could be extracted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeneratedStatement {
    pub fn ok(statement: impl Into<String>) -> Self {
        Self {
            statement: Some(statement.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            statement: None,
            error: Some(error.into()),
        }
    }

    /// The usable statement text, or the generation error
    pub fn into_result(self) -> Result<String, String> {
        match self.statement {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(self
                .error
                .unwrap_or_else(|| "generator returned an empty statement".to_string())),
        }
    }
}

/// Reply of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub statements: Vec<GeneratedStatement>,
    /// Operator actually applied; invented when the novel arm was asked for
    pub operator: OperatorDescriptor,
}

impl GenerationOutput {
    /// Reject replies that cannot be credited to an operator
    pub fn validate(&self) -> Result<(), SearchError> {
        let name = self.operator.name.trim();
        if name.is_empty() {
            return Err(SearchError::protocol("generation reply has no operator name"));
        }
        if name == NOVEL_OPERATOR {
            return Err(SearchError::protocol(format!(
                "generation reply used the reserved operator name {NOVEL_OPERATOR}"
            )));
        }
        Ok(())
    }
}

/// Statement generator (an LLM behind some API)
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ServiceError>;
}

/// Input for one judging call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_statement: Option<String>,
    /// Statements that compiled and were not closed by a cheap tactic
    pub statements: Vec<String>,
}

/// Scores statements for novelty, difficulty and provability
#[async_trait]
pub trait QualityJudge: Send + Sync {
    /// One verdict per statement, in order
    async fn judge(&self, request: &JudgeRequest) -> Result<Vec<JudgedCandidate>, ServiceError>;
}
