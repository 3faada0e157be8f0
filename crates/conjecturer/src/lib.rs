// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Getters and builders don't need must_use
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::module_name_repetitions)] // search::SearchLoop is clear
#![allow(clippy::float_cmp)] // Quantised scores are exact multiples of 5

//! Feedback-driven conjecture search over Lean 4
//!
//! Ties the workspace together:
//! - **SearchLoop**: chooses a parent and an operator, generates statements,
//!   verifies them through the cascade, judges the survivors and feeds the
//!   merged fitness back into the archive and the operator bandit
//! - **FitnessConfig**: the fitness merge of cascade outcome and judge scores
//! - **SharedSearchState**: archive, operator stats and catalogue behind one
//!   lock
//!
//! External model services are reached through [`GenerationService`],
//! [`QualityJudge`] and the cascade's verifier and prover traits.

pub mod config;
pub mod error;
pub mod fitness;
pub mod search;
pub mod services;
pub mod state;

pub use config::{SearchConfig, DEFAULT_ARCHIVE_FILE, DEFAULT_DATA_DIR};
pub use error::{SearchError, SearchResult};
pub use fitness::{quantize, FitnessConfig, FitnessResult, JudgeFlags, JudgeScores, JudgedCandidate};
pub use search::{
    IterationSummary, ProvedStatement, RestoreSummary, SearchContext, SearchLoop, SearchServices,
};
pub use services::{
    GeneratedStatement, GenerationOutput, GenerationRequest, GenerationService, JudgeRequest,
    QualityJudge,
};
pub use state::{SearchSnapshot, SearchState, SharedSearchState};

// Re-export the component crates so the binary needs one dependency path
pub use conjecturer_archive as archive;
pub use conjecturer_cascade as cascade;
pub use conjecturer_ledger as ledger;
pub use conjecturer_scheduler as scheduler;
