//! Ledger entries

use conjecturer_archive::FeatureVector;
use conjecturer_cascade::VerificationOutcome;
use serde::{Deserialize, Serialize};

/// One evaluated candidate, as appended to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// UUID v4, filled on append when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unix seconds, filled on append when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Context (seed file) the candidate was generated for
    #[serde(default)]
    pub context_id: String,
    /// Search step that produced the candidate
    #[serde(default)]
    pub iteration: u64,
    /// Cascade-local candidate id
    #[serde(default)]
    pub candidate_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Mutation operator credited with the candidate
    pub operator_id: String,
    pub statement: String,
    pub outcome: VerificationOutcome,
    /// Merged fitness in [0, 1]; operator reward
    #[serde(default, alias = "score")]
    pub fitness_score: f64,
    /// Judge scores, present only for judged candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_vector: Option<FeatureVector>,
    /// Goal of the `sorry` proof at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Judge flags (`ill_typed`, `restatement`, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl LedgerRecord {
    /// Record without judge data or ledger identity
    pub fn new(
        operator_id: impl Into<String>,
        statement: impl Into<String>,
        outcome: VerificationOutcome,
    ) -> Self {
        Self {
            id: None,
            timestamp: None,
            context_id: String::new(),
            iteration: 0,
            candidate_id: 0,
            parent_id: None,
            operator_id: operator_id.into(),
            statement: statement.into(),
            outcome,
            fitness_score: 0.0,
            feature_vector: None,
            goal: None,
            flags: Vec::new(),
            justification: None,
        }
    }

    pub fn with_fitness(mut self, fitness_score: f64) -> Self {
        self.fitness_score = fitness_score;
        self
    }

    pub fn with_context(mut self, context_id: impl Into<String>, iteration: u64) -> Self {
        self.context_id = context_id.into();
        self.iteration = iteration;
        self
    }

    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Outcome is worth reporting: compiled and not closed by a cheap tactic
    pub fn is_non_trivial(&self) -> bool {
        self.outcome.is_non_trivial()
    }
}
