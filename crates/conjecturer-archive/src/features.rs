//! Feature space discretisation
//!
//! A [`FeatureSpace`] is the ordered list of scoring dimensions the archive
//! bins on. Scores live in `[0, 100]`; each dimension is cut into a fixed
//! number of equal-width bins and the tuple of bin indices is the
//! [`NicheKey`] of a record.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::ArchiveError;

/// Upper bound of every feature score
pub const MAX_SCORE: f64 = 100.0;

/// One binned scoring dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Name of the score (e.g. `novelty`)
    pub name: String,
    /// Number of bins for this dimension
    pub bins: usize,
}

impl Dimension {
    /// Create a dimension with the given bin count
    pub fn new(name: impl Into<String>, bins: usize) -> Self {
        Self {
            name: name.into(),
            bins,
        }
    }
}

/// Ordered set of dimensions defining the niche grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpace {
    /// Dimensions in key order
    pub dimensions: Vec<Dimension>,
}

impl Default for FeatureSpace {
    fn default() -> Self {
        Self {
            dimensions: vec![
                Dimension::new("novelty", 10),
                Dimension::new("difficulty", 10),
                Dimension::new("provability_estimate", 10),
            ],
        }
    }
}

impl FeatureSpace {
    /// Create a feature space from dimensions
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }

    /// Check that every dimension has at least one bin and names are unique
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.dimensions.is_empty() {
            return Err(ArchiveError::Config(
                "feature space needs at least one dimension".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for dim in &self.dimensions {
            if dim.bins == 0 {
                return Err(ArchiveError::Config(format!(
                    "dimension '{}' has zero bins",
                    dim.name
                )));
            }
            if !seen.insert(dim.name.as_str()) {
                return Err(ArchiveError::Config(format!(
                    "dimension '{}' listed twice",
                    dim.name
                )));
            }
        }
        Ok(())
    }

    /// Number of dimensions
    pub fn arity(&self) -> usize {
        self.dimensions.len()
    }

    /// Total number of niches in the grid
    pub fn niche_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.bins).product()
    }

    /// Discretise a feature vector into a niche key
    ///
    /// Returns `None` when a configured dimension is absent from the vector.
    /// Out-of-range scores are clamped and NaN scores count as 0.
    pub fn key_for(&self, features: &FeatureVector) -> Option<NicheKey> {
        let mut indices = Vec::with_capacity(self.dimensions.len());
        for dim in &self.dimensions {
            let Some(raw) = features.get(&dim.name) else {
                warn!(dimension = %dim.name, "missing feature dimension; skipping record");
                return None;
            };
            let score = if raw.is_nan() {
                warn!(dimension = %dim.name, "non-numeric feature score; defaulting to 0");
                0.0
            } else {
                raw.clamp(0.0, MAX_SCORE)
            };
            indices.push(bin_index(score, dim.bins));
        }
        Some(NicheKey(indices))
    }

    /// Check that a parsed key fits this grid
    pub fn contains(&self, key: &NicheKey) -> bool {
        key.0.len() == self.dimensions.len()
            && key
                .0
                .iter()
                .zip(&self.dimensions)
                .all(|(idx, dim)| *idx < dim.bins)
    }
}

fn bin_index(score: f64, bins: usize) -> usize {
    let scaled = (score / MAX_SCORE * bins as f64).floor();
    (scaled.max(0.0) as usize).min(bins - 1)
}

/// Named feature scores produced by the quality judge
///
/// Deserialisation accepts numbers and numeric strings; any other value is
/// kept as NaN so the archive can default it when binning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector(BTreeMap<String, f64>);

impl FeatureVector {
    /// Create an empty feature vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style score insertion
    pub fn with(mut self, name: impl Into<String>, score: f64) -> Self {
        self.0.insert(name.into(), score);
        self
    }

    /// Set a score
    pub fn set(&mut self, name: impl Into<String>, score: f64) {
        self.0.insert(name.into(), score);
    }

    /// Get a score by dimension name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Iterate over `(name, score)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether no scores are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let scores = raw
            .into_iter()
            .map(|(name, value)| {
                let score = match &value {
                    serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                    serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
                    _ => f64::NAN,
                };
                (name, score)
            })
            .collect();
        Ok(Self(scores))
    }
}

impl<const N: usize> From<[(&str, f64); N]> for FeatureVector {
    fn from(pairs: [(&str, f64); N]) -> Self {
        Self(pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect())
    }
}

/// Discrete niche coordinates, one bin index per dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NicheKey(pub Vec<usize>);

impl NicheKey {
    /// Bin indices in dimension order
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for NicheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&joined.join(","))
    }
}

impl FromStr for NicheKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map(NicheKey)
    }
}
