// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Builder methods and getters don't need must_use
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::cast_precision_loss)] // usize to f64 for bin math is intentional
#![allow(clippy::cast_possible_truncation)] // Bin indices are clamped before casting
#![allow(clippy::cast_sign_loss)] // Scores are clamped to [0, 100] before casting
#![allow(clippy::float_cmp)] // Exact fitness ties are part of the replacement rule
#![allow(clippy::module_name_repetitions)] // archive::ArchiveConfig is clear

//! MAP-Elites feature archive
//!
//! This crate provides:
//! - **FeatureSpace**: the configured scoring dimensions and their bin counts
//! - **NicheKey**: the discretised coordinates of a candidate
//! - **FeatureArchive**: one elite per niche, with pruning, sampling and
//!   crash-safe persistence
//!
//! ```rust
//! use conjecturer_archive::{ArchiveConfig, EliteRecord, FeatureArchive, FeatureVector};
//!
//! let mut archive = FeatureArchive::new(ArchiveConfig::default()).unwrap();
//! let features = FeatureVector::from([
//!     ("novelty", 70.0),
//!     ("difficulty", 40.0),
//!     ("provability_estimate", 100.0),
//! ]);
//! let record = EliteRecord::new("generalize", "theorem t : True := by\n", 0.9, features);
//! assert!(archive.insert(record).is_accepted());
//! ```

pub mod archive;
pub mod features;
pub mod persist;
pub mod record;

pub use archive::{ArchiveConfig, FeatureArchive, InsertOutcome};
pub use features::{Dimension, FeatureSpace, FeatureVector, NicheKey, MAX_SCORE};
pub use persist::write_json_atomic;
pub use record::EliteRecord;

use thiserror::Error;

/// Errors from the archive
///
/// Only configuration and persistence can fail; `insert` and `load` log
/// and skip bad data instead.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Feature space configuration is unusable
    #[error("Invalid archive configuration: {0}")]
    Config(String),
    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
