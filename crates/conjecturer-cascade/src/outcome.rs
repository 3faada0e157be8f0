//! Verification outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cascade stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Statement elaborates with a `sorry` proof
    Compile,
    /// First cheap tactic (direct lemma lookup)
    CheapTactic1,
    /// Second cheap tactic (general automation)
    CheapTactic2,
    /// pass@k over prover completions
    ProofSearch,
    /// pass@k over completions of the negated statement
    NegationSearch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compile => "compile",
            Stage::CheapTactic1 => "cheap-tactic-1",
            Stage::CheapTactic2 => "cheap-tactic-2",
            Stage::ProofSearch => "proof-search",
            Stage::NegationSearch => "negation-search",
        };
        f.write_str(name)
    }
}

/// Final classification of one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The statement does not elaborate
    CompileFailed { diagnostics: Vec<String> },
    /// Closed by a cheap tactic (`stage` is 1 or 2)
    TriviallyProvable { stage: u8, proof: String },
    /// At least one prover completion checks
    NonTriviallyProvable { proof: String },
    /// A completion of the negated statement checks
    LikelyFalse {
        negated_statement: String,
        proof: String,
    },
    /// Neither the statement nor its negation was proved
    Inconclusive,
}

impl VerificationOutcome {
    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::CompileFailed { .. } => "compile_failed",
            Self::TriviallyProvable { .. } => "trivially_provable",
            Self::NonTriviallyProvable { .. } => "non_trivially_provable",
            Self::LikelyFalse { .. } => "likely_false",
            Self::Inconclusive => "inconclusive",
        }
    }

    /// Proof text retained for this outcome
    pub fn proof(&self) -> Option<&str> {
        match self {
            Self::TriviallyProvable { proof, .. }
            | Self::NonTriviallyProvable { proof }
            | Self::LikelyFalse { proof, .. } => Some(proof),
            Self::CompileFailed { .. } | Self::Inconclusive => None,
        }
    }

    /// The statement elaborated
    pub fn compiled(&self) -> bool {
        !matches!(self, Self::CompileFailed { .. })
    }

    /// Compiled and not closed by a cheap tactic
    pub fn is_non_trivial(&self) -> bool {
        matches!(
            self,
            Self::NonTriviallyProvable { .. } | Self::LikelyFalse { .. } | Self::Inconclusive
        )
    }

    /// The full proof search settled the statement either way
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::NonTriviallyProvable { .. } | Self::LikelyFalse { .. }
        )
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TriviallyProvable { stage, .. } => write!(f, "trivially_provable({stage})"),
            other => f.write_str(other.label()),
        }
    }
}
