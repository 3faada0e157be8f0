//! Search configuration

use conjecturer_archive::ArchiveConfig;
use conjecturer_cascade::CascadeConfig;
use conjecturer_ledger::DEFAULT_LEDGER_FILE;
use conjecturer_scheduler::{ExplorationSchedule, DEFAULT_CATALOG_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SearchError, SearchResult};
use crate::fitness::FitnessConfig;

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Archive snapshot file name inside the data directory
pub const DEFAULT_ARCHIVE_FILE: &str = "program_map.json";

/// Everything the search loop needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub archive: ArchiveConfig,
    pub exploration: ExplorationSchedule,
    pub cascade: CascadeConfig,
    pub fitness: FitnessConfig,
    /// Parents drawn per iteration; the first seeds generation
    pub parents_per_iteration: usize,
    /// Iterations per context
    pub max_iterations: u64,
    pub ledger_path: PathBuf,
    /// Operator catalogue written by the search
    pub catalog_path: PathBuf,
    /// Read-only operator catalogue merged in at start-up
    pub seed_catalog_path: Option<PathBuf>,
    /// Ledger records below this fitness are never parents
    pub min_parent_score: f64,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Append proved statements to the context for later iterations
    pub grow_context: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::in_data_dir(DEFAULT_DATA_DIR)
    }
}

impl SearchConfig {
    /// Default configuration with every file under `data_dir`
    pub fn in_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            archive: ArchiveConfig::at(dir.join(DEFAULT_ARCHIVE_FILE)),
            exploration: ExplorationSchedule::default(),
            cascade: CascadeConfig::default(),
            fitness: FitnessConfig::default(),
            parents_per_iteration: 2,
            max_iterations: 5,
            ledger_path: dir.join(DEFAULT_LEDGER_FILE),
            catalog_path: dir.join(DEFAULT_CATALOG_FILE),
            seed_catalog_path: None,
            min_parent_score: 0.0,
            seed: None,
            grow_context: false,
        }
    }

    /// Island runs: niches cleared every iteration
    pub fn island(data_dir: impl AsRef<Path>) -> Self {
        let mut config = Self::in_data_dir(data_dir);
        config.archive.reset_each_iteration = true;
        config
    }

    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> SearchResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Move every data file into `data_dir`, keeping file names
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        let rebase = |path: &Path, default: &str| {
            dir.join(path.file_name().map_or_else(|| default.into(), |n| n.to_os_string()))
        };
        self.archive.file_path = rebase(&self.archive.file_path, DEFAULT_ARCHIVE_FILE);
        self.ledger_path = rebase(&self.ledger_path, DEFAULT_LEDGER_FILE);
        self.catalog_path = rebase(&self.catalog_path, DEFAULT_CATALOG_FILE);
        self
    }

    /// Check the values the loop relies on
    pub fn validate(&self) -> SearchResult<()> {
        self.archive.space.validate()?;
        if self.cascade.k == 0 {
            return Err(SearchError::config("cascade.k must be at least 1"));
        }
        if self.cascade.stage_timeout_secs == 0 {
            return Err(SearchError::config("cascade.stage_timeout_secs must be positive"));
        }
        if self.parents_per_iteration == 0 {
            return Err(SearchError::config("parents_per_iteration must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_live_in_data_dir() {
        let config = SearchConfig::default();
        assert_eq!(config.archive.file_path, PathBuf::from("data/program_map.json"));
        assert_eq!(config.ledger_path, PathBuf::from("data/program_db.jsonl"));
        assert_eq!(config.cascade.k, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(
            &path,
            r#"{"cascade": {"k": 4}, "archive": {"reset_each_iteration": true}, "seed": 7}"#,
        )
        .unwrap();
        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.cascade.k, 4);
        assert_eq!(config.cascade.first_tactic, "exact?");
        assert!(config.archive.reset_each_iteration);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.parents_per_iteration, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"cascade": {"k": 0}}"#).unwrap();
        assert!(matches!(
            SearchConfig::from_file(&path),
            Err(SearchError::Config(_))
        ));
    }

    #[test]
    fn test_with_data_dir() {
        let config = SearchConfig::default().with_data_dir("/tmp/run1");
        assert_eq!(config.archive.file_path, PathBuf::from("/tmp/run1/program_map.json"));
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/run1/mutations.json"));
    }
}
