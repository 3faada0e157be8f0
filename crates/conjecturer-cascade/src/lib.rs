// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Getters and builders don't need must_use
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::module_name_repetitions)] // cascade::CascadeConfig is clear

//! Staged Lean verification for generated conjectures
//!
//! A batch of candidates is classified by a cascade of increasingly
//! expensive checks:
//!
//! 1. Compile with a `sorry` proof
//! 2. Cheap tactic `exact?`
//! 3. Cheap tactic `aesop?`
//! 4. pass@k over prover completions
//! 5. pass@k over completions of the negated statement
//!
//! Each stage is one batched round trip to the verification server. Results
//! are matched back to candidates by id; any id anomaly aborts the run
//! instead of risking a misassigned proof.

pub mod batch;
pub mod candidate;
pub mod cascade;
pub mod outcome;
pub mod response;
pub mod service;

pub use batch::{align_by_index, regroup, CompositeId, ProtocolError};
pub use candidate::{Candidate, CandidateIds};
pub use cascade::{CascadeConfig, CascadeError, CascadeReport, StageCounts, VerificationCascade};
pub use outcome::{Stage, VerificationOutcome};
pub use response::{
    CheckResult, LeanMessage, LeanResponse, Position, RawCheckResponse, Severity, SorryInfo,
};
pub use service::{
    NegationRequest, ProverService, ServiceError, Snippet, VerificationService,
};
