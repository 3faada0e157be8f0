//! Shared mutable search state
//!
//! The archive, the operator statistics and the operator catalogue change
//! together and are guarded by one async lock. Selection never holds the
//! lock: it works on a [`SearchSnapshot`] cloned out of it.

use conjecturer_archive::{EliteRecord, FeatureArchive, InsertOutcome};
use conjecturer_scheduler::{OperatorCatalog, OperatorDescriptor, OperatorTable};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::SearchResult;

/// State mutated by every iteration
#[derive(Debug)]
pub struct SearchState {
    pub archive: FeatureArchive,
    pub operators: OperatorTable,
    pub catalog: OperatorCatalog,
}

impl SearchState {
    pub fn new(archive: FeatureArchive, operators: OperatorTable, catalog: OperatorCatalog) -> Self {
        Self {
            archive,
            operators,
            catalog,
        }
    }

    /// Insert an elite and credit its operator
    pub fn record(&mut self, elite: Option<EliteRecord>, operator: &str, reward: f64) -> Option<InsertOutcome> {
        self.operators.update(operator, reward);
        elite.map(|e| self.archive.insert(e))
    }

    /// Prune, then write archive and catalogue if they changed
    ///
    /// Returns the number of pruned elites.
    pub fn prune_and_persist(&mut self) -> SearchResult<usize> {
        let pruned = self.archive.prune();
        let archive_written = self.archive.persist()?;
        let catalog_written = self.catalog.persist()?;
        debug!(pruned, archive_written, catalog_written, "search state persisted");
        Ok(pruned)
    }
}

/// Read-only copy used for selection
#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub archive: FeatureArchive,
    pub operators: OperatorTable,
    /// Operators registered for the snapshot's context
    pub known_operators: Vec<OperatorDescriptor>,
}

/// Handle to the state shared by the search loop and its observers
#[derive(Debug, Clone)]
pub struct SharedSearchState {
    inner: Arc<Mutex<SearchState>>,
}

impl SharedSearchState {
    pub fn new(state: SearchState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Exclusive access
    pub async fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.inner.lock().await
    }

    /// Clone what selection needs for `context_id`
    ///
    /// In island mode the archive is cleared first.
    pub async fn snapshot(&self, context_id: &str) -> SearchSnapshot {
        let mut state = self.inner.lock().await;
        if state.archive.config().reset_each_iteration {
            state.archive.reset();
        }
        SearchSnapshot {
            archive: state.archive.clone(),
            operators: state.operators.clone(),
            known_operators: state.catalog.operators(context_id),
        }
    }
}
