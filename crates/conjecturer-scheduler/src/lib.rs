// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Getters don't need must_use
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::cast_precision_loss)] // Trial counts stay far below 2^52

//! Operator and parent scheduling
//!
//! Decides what the next search iteration tries:
//! - **OperatorTable**: Thompson sampling over mutation operators with a
//!   decaying exploration floor on the novel arm
//! - **ParentSelector**: parents from the archive, or from the ledger while
//!   the archive is still empty
//! - **OperatorCatalog**: the per-context operator descriptions offered to
//!   the generator

pub mod catalog;
pub mod operators;
pub mod parents;

pub use catalog::{OperatorCatalog, OperatorDescriptor, DEFAULT_CATALOG_FILE};
pub use operators::{ExplorationSchedule, OperatorStats, OperatorTable, NOVEL_OPERATOR};
pub use parents::{Parent, ParentSelector, ParentSource};

use thiserror::Error;

/// Errors from scheduler persistence
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Catalogue snapshot could not be written
    #[error("Failed to persist operator catalogue: {0}")]
    Persist(#[from] conjecturer_archive::ArchiveError),
}
