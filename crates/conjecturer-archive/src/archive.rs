//! The elite map
//!
//! [`FeatureArchive`] keeps at most one [`EliteRecord`] per [`NicheKey`].
//! It is a plain single-owner structure; callers sharing it across tasks
//! wrap it in one lock together with the operator statistics.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::features::{FeatureSpace, NicheKey};
use crate::persist::{clean_stale_temp, write_json_atomic};
use crate::record::EliteRecord;
use crate::ArchiveError;

/// Configuration for the feature archive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Dimensions and bin counts
    pub space: FeatureSpace,
    /// Clear every niche at the start of each iteration ("island" mode)
    pub reset_each_iteration: bool,
    /// Where the archive snapshot lives
    pub file_path: PathBuf,
    /// Elites with fitness strictly below this are pruned
    pub prune_threshold: f64,
    /// Elites older than this many seconds are pruned (0 disables)
    pub stale_after_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            space: FeatureSpace::default(),
            reset_each_iteration: false,
            file_path: PathBuf::from("data/program_map.json"),
            prune_threshold: 0.0,
            stale_after_secs: 0,
        }
    }
}

impl ArchiveConfig {
    /// Island set-up: fresh niches every iteration
    pub fn island() -> Self {
        Self {
            reset_each_iteration: true,
            ..Default::default()
        }
    }

    /// Cumulative archive stored at `file_path`
    pub fn at(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }
}

/// What `insert` did with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The niche was empty
    Inserted(NicheKey),
    /// The record displaced the incumbent
    Replaced(NicheKey),
    /// The incumbent is at least as fit
    Rejected(NicheKey),
    /// No usable niche key or fitness; nothing changed
    Skipped,
}

impl InsertOutcome {
    /// Whether the archive changed
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Inserted(_) | Self::Replaced(_))
    }
}

/// MAP-Elites archive: best record per niche
#[derive(Debug, Clone)]
pub struct FeatureArchive {
    config: ArchiveConfig,
    elites: HashMap<NicheKey, EliteRecord>,
    dirty: bool,
}

impl FeatureArchive {
    /// Create an empty archive after validating the feature space
    pub fn new(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        config.space.validate()?;
        Ok(Self {
            config,
            elites: HashMap::new(),
            dirty: false,
        })
    }

    /// Create an archive and load the persisted snapshot, if any
    pub fn open(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        let mut archive = Self::new(config)?;
        archive.load();
        Ok(archive)
    }

    /// Archive configuration
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Number of occupied niches
    pub fn len(&self) -> usize {
        self.elites.len()
    }

    /// Whether no niche is occupied
    pub fn is_empty(&self) -> bool {
        self.elites.is_empty()
    }

    /// Whether there are unpersisted changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Fraction of the grid that is occupied
    pub fn coverage(&self) -> f64 {
        let total = self.config.space.niche_count();
        if total == 0 {
            0.0
        } else {
            self.elites.len() as f64 / total as f64
        }
    }

    /// Elite stored at `key`
    pub fn get(&self, key: &NicheKey) -> Option<&EliteRecord> {
        self.elites.get(key)
    }

    /// All elites, in unspecified order
    pub fn elites(&self) -> Vec<EliteRecord> {
        self.elites.values().cloned().collect()
    }

    /// `(key, elite)` pairs sorted by key
    pub fn entries(&self) -> Vec<(NicheKey, EliteRecord)> {
        let mut entries: Vec<_> = self
            .elites
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Offer a record to its niche
    ///
    /// Never fails: records without a usable key or with a non-finite
    /// fitness are logged and skipped.
    pub fn insert(&mut self, record: EliteRecord) -> InsertOutcome {
        if !record.fitness_score.is_finite() {
            warn!(id = %record.id, "record has non-finite fitness; skipping");
            return InsertOutcome::Skipped;
        }
        let Some(key) = self.config.space.key_for(&record.feature_vector) else {
            warn!(id = %record.id, "record has no valid niche key; skipping");
            return InsertOutcome::Skipped;
        };

        match self.elites.get(&key) {
            None => {
                debug!(niche = %key, score = record.fitness_score, "new elite");
                self.elites.insert(key.clone(), record);
                self.dirty = true;
                InsertOutcome::Inserted(key)
            }
            Some(incumbent) if record.beats(incumbent) => {
                info!(
                    niche = %key,
                    old = incumbent.fitness_score,
                    new = record.fitness_score,
                    "elite replaced"
                );
                self.elites.insert(key.clone(), record);
                self.dirty = true;
                InsertOutcome::Replaced(key)
            }
            Some(_) => InsertOutcome::Rejected(key),
        }
    }

    /// Remove under-performing and stale elites using the current time
    pub fn prune(&mut self) -> usize {
        self.prune_at(Utc::now().timestamp())
    }

    /// Remove under-performing and stale elites relative to `now`
    pub fn prune_at(&mut self, now: i64) -> usize {
        let threshold = self.config.prune_threshold;
        let stale_after = i64::try_from(self.config.stale_after_secs).unwrap_or(i64::MAX);
        let before = self.elites.len();

        self.elites.retain(|_, rec| {
            let under = rec.fitness_score < threshold;
            let stale = stale_after > 0 && now.saturating_sub(rec.timestamp) > stale_after;
            !(under || stale)
        });

        let removed = before - self.elites.len();
        if removed > 0 {
            self.dirty = true;
            info!(removed, "pruned underperforming/stale elites");
        }
        removed
    }

    /// Drop every elite
    pub fn reset(&mut self) {
        self.elites.clear();
        self.dirty = true;
    }

    /// Up to `k` distinct elites chosen uniformly at random
    pub fn sample(&self, k: usize) -> Vec<EliteRecord> {
        self.sample_with(k, &mut rand::thread_rng())
    }

    /// Like [`sample`](Self::sample) with a caller-supplied RNG
    pub fn sample_with<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<EliteRecord> {
        // Sorted first so a seeded RNG gives reproducible picks
        let mut pool: Vec<&EliteRecord> = self.elites.values().collect();
        pool.sort_by(|a, b| a.id.cmp(&b.id));
        if pool.len() <= k {
            return pool.into_iter().cloned().collect();
        }
        pool.choose_multiple(rng, k).map(|r| (*r).clone()).collect()
    }

    /// Write the snapshot if anything changed since the last write
    ///
    /// Returns whether a write happened.
    pub fn persist(&mut self) -> Result<bool, ArchiveError> {
        if !self.dirty {
            return Ok(false);
        }
        let document: BTreeMap<String, &EliteRecord> = self
            .elites
            .iter()
            .map(|(key, rec)| (key.to_string(), rec))
            .collect();
        write_json_atomic(&self.config.file_path, &document)?;
        self.dirty = false;
        debug!(path = ?self.config.file_path, elites = document.len(), "archive persisted");
        Ok(true)
    }

    /// Merge the persisted snapshot into memory
    ///
    /// Never fails: unreadable files and malformed entries are logged and
    /// skipped. Returns the number of elites loaded.
    pub fn load(&mut self) -> usize {
        let path = self.config.file_path.clone();
        clean_stale_temp(&path);
        if !path.exists() {
            return 0;
        }

        let document: BTreeMap<String, serde_json::Value> = match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!(?path, error = %e, "failed to load archive");
                return 0;
            }
        };

        let mut loaded = 0;
        for (key_str, value) in document {
            let key = match key_str.parse::<NicheKey>() {
                Ok(key) if self.config.space.contains(&key) => key,
                _ => {
                    warn!(key = %key_str, "bad key in archive file");
                    continue;
                }
            };
            match serde_json::from_value::<EliteRecord>(value) {
                Ok(record) => {
                    self.elites.insert(key, record);
                    loaded += 1;
                }
                Err(e) => warn!(key = %key_str, error = %e, "bad record in archive file"),
            }
        }
        info!(loaded, ?path, "archive loaded");
        loaded
    }
}
