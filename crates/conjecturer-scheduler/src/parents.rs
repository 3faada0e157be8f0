//! Parent selection

use conjecturer_archive::{EliteRecord, FeatureArchive};
use conjecturer_ledger::LedgerRecord;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Where a parent was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSource {
    Archive,
    Ledger,
}

/// A previously evaluated statement used to seed generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    pub id: Option<String>,
    pub statement: String,
    pub operator_id: String,
    pub fitness_score: f64,
    pub source: ParentSource,
}

impl From<EliteRecord> for Parent {
    fn from(record: EliteRecord) -> Self {
        Self {
            id: Some(record.id),
            statement: record.payload,
            operator_id: record.operator_id,
            fitness_score: record.fitness_score,
            source: ParentSource::Archive,
        }
    }
}

impl From<&LedgerRecord> for Parent {
    fn from(record: &LedgerRecord) -> Self {
        Self {
            id: record.id.clone(),
            statement: record.statement.clone(),
            operator_id: record.operator_id.clone(),
            fitness_score: record.fitness_score,
            source: ParentSource::Ledger,
        }
    }
}

/// Chooses parents from the archive, falling back to the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentSelector {
    /// Ledger records below this fitness are never used as parents
    pub min_ledger_score: f64,
}

impl ParentSelector {
    pub fn new(min_ledger_score: f64) -> Self {
        Self { min_ledger_score }
    }

    /// Up to `k` parents
    ///
    /// Uniform over archive elites; when the archive is empty each ledger
    /// record draws from `Beta(score + 1, 2 - score)` with the fitness
    /// clamped to [0, 1], and the `k` highest draws win.
    pub fn choose_parents<R: Rng + ?Sized>(
        &self,
        archive: &FeatureArchive,
        ledger: &[LedgerRecord],
        k: usize,
        rng: &mut R,
    ) -> Vec<Parent> {
        if k == 0 {
            return Vec::new();
        }
        let elites = archive.sample_with(k, rng);
        if !elites.is_empty() {
            return elites.into_iter().map(Parent::from).collect();
        }
        let parents = self.sample_ledger(ledger, k, rng);
        debug!(candidates = ledger.len(), chosen = parents.len(), "parents drawn from ledger");
        parents
    }

    /// Thompson draw over ledger records
    pub fn sample_ledger<R: Rng + ?Sized>(
        &self,
        ledger: &[LedgerRecord],
        k: usize,
        rng: &mut R,
    ) -> Vec<Parent> {
        let mut draws: Vec<(f64, &LedgerRecord)> = ledger
            .iter()
            .filter(|r| r.fitness_score >= self.min_ledger_score)
            .filter_map(|r| {
                // NaN never passes the score filter above
                let score = r.fitness_score.clamp(0.0, 1.0);
                let dist = Beta::new(score + 1.0, 2.0 - score).ok()?;
                Some((dist.sample(rng), r))
            })
            .collect();
        draws.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        draws.into_iter().take(k).map(|(_, r)| Parent::from(r)).collect()
    }
}
