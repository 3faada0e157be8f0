// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! Library half of the `conjecturer` binary
//!
//! - [`http`]: reqwest adapters for the Lean server, the prover, the
//!   generator and the judge
//! - [`commands`]: the subcommand implementations

pub mod commands;
pub mod http;
