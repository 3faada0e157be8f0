//! CLI command implementations
//!
//! Each command is in its own module for better organization.

pub mod common;
pub mod report;
pub mod run;

// Re-export commonly used items
pub use report::{run_elites, run_operators, run_results};
pub use run::{run_search, RunCmdConfig};
