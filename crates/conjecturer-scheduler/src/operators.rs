//! Operator bandit
//!
//! Each mutation operator is an arm with a Beta posterior over its success
//! rate. Selection is Thompson sampling over the known arms plus the
//! reserved novel arm, with a decaying exploration floor that forces the
//! novel arm outright.

use conjecturer_ledger::LedgerRecord;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Arm asking the generator to invent a new operator
pub const NOVEL_OPERATOR: &str = "_NOVEL_";

/// Success/trial counts for one arm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub successes: u64,
    pub trials: u64,
}

impl OperatorStats {
    /// Beta posterior parameters under a uniform prior
    pub fn posterior(&self) -> (f64, f64) {
        let failures = self.trials.saturating_sub(self.successes);
        (self.successes as f64 + 1.0, failures as f64 + 1.0)
    }

    /// Posterior mean
    pub fn mean(&self) -> f64 {
        let (a, b) = self.posterior();
        a / (a + b)
    }

    /// Draw from the posterior
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (a, b) = self.posterior();
        match Beta::new(a, b) {
            Ok(dist) => dist.sample(rng),
            Err(e) => {
                warn!(alpha = a, beta = b, error = %e, "invalid posterior");
                0.0
            }
        }
    }
}

/// Probability of forcing the novel arm at a given step
///
/// `epsilon(step) = max(floor, base * exp(-step / decay))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationSchedule {
    pub floor: f64,
    pub base: f64,
    pub decay: f64,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self {
            floor: 0.2,
            base: 0.25,
            decay: 5000.0,
        }
    }
}

impl ExplorationSchedule {
    /// Pure Thompson sampling, never forcing the novel arm
    pub fn disabled() -> Self {
        Self {
            floor: 0.0,
            base: 0.0,
            decay: 1.0,
        }
    }

    pub fn epsilon(&self, step: u64) -> f64 {
        let decayed = if self.decay > 0.0 {
            self.base * (-(step as f64) / self.decay).exp()
        } else {
            0.0
        };
        self.floor.max(decayed).clamp(0.0, 1.0)
    }
}

/// Per-operator statistics and the selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorTable {
    stats: BTreeMap<String, OperatorStats>,
    schedule: ExplorationSchedule,
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new(ExplorationSchedule::default())
    }
}

impl OperatorTable {
    pub fn new(schedule: ExplorationSchedule) -> Self {
        let mut stats = BTreeMap::new();
        stats.insert(NOVEL_OPERATOR.to_string(), OperatorStats::default());
        Self { stats, schedule }
    }

    /// Rebuild statistics by replaying ledger rewards in order
    pub fn from_ledger(records: &[LedgerRecord], schedule: ExplorationSchedule) -> Self {
        let mut table = Self::new(schedule);
        for record in records {
            table.update(&record.operator_id, record.fitness_score);
        }
        debug!(records = records.len(), arms = table.stats.len(), "operator table restored");
        table
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    pub fn get(&self, operator: &str) -> Option<OperatorStats> {
        self.stats.get(operator).copied()
    }

    /// All arms with statistics, sorted by name
    pub fn stats(&self) -> impl Iterator<Item = (&str, OperatorStats)> {
        self.stats.iter().map(|(name, s)| (name.as_str(), *s))
    }

    /// Record one trial; a positive reward counts as a success
    pub fn update(&mut self, operator: &str, reward: f64) {
        let entry = self.stats.entry(operator.to_string()).or_default();
        entry.trials += 1;
        if reward > 0.0 {
            entry.successes += 1;
        }
    }

    /// Pick the operator for the next iteration
    ///
    /// With probability `epsilon(step)` the novel arm is returned directly.
    /// Otherwise every arm in `known` plus the novel arm draws from its
    /// posterior (unseen arms use Beta(1, 1)) and the highest draw wins.
    pub fn choose_operator<R: Rng + ?Sized>(
        &self,
        known: &[String],
        step: u64,
        rng: &mut R,
    ) -> String {
        let epsilon = self.schedule.epsilon(step);
        if rng.gen::<f64>() < epsilon {
            debug!(step, epsilon, "exploration forced novel operator");
            return NOVEL_OPERATOR.to_string();
        }

        let mut arms: Vec<&str> = Vec::with_capacity(known.len() + 1);
        for name in known.iter().map(String::as_str).chain([NOVEL_OPERATOR]) {
            if !arms.contains(&name) {
                arms.push(name);
            }
        }

        let mut best = (NOVEL_OPERATOR, f64::NEG_INFINITY);
        for arm in arms {
            let draw = self.get(arm).unwrap_or_default().sample(rng);
            if draw > best.1 {
                best = (arm, draw);
            }
        }
        best.0.to_string()
    }
}
