//! Elite records stored in the archive

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Best-known candidate for one niche
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliteRecord {
    /// Unique record id (UUID v4 unless supplied)
    pub id: String,
    /// Id of the parent record this candidate was mutated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Mutation operator that produced the candidate
    pub operator_id: String,
    /// Statement text, opaque to the archive
    pub payload: String,
    /// Scalar fitness used for elite replacement
    pub fitness_score: f64,
    /// Judge scores the niche key is derived from
    pub feature_vector: FeatureVector,
    /// Whether the candidate compiled
    #[serde(default)]
    pub valid: bool,
    /// Unix seconds at evaluation time
    pub timestamp: i64,
}

impl EliteRecord {
    /// Create a record with a fresh id and the current timestamp
    pub fn new(
        operator_id: impl Into<String>,
        payload: impl Into<String>,
        fitness_score: f64,
        feature_vector: FeatureVector,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id: None,
            operator_id: operator_id.into(),
            payload: payload.into(),
            fitness_score,
            feature_vector,
            valid: true,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Set the parent id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Override the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether this record should displace `incumbent` in its niche
    ///
    /// Strictly higher fitness wins; equal fitness wins only with a strictly
    /// newer timestamp, so the incumbent keeps exact ties.
    pub fn beats(&self, incumbent: &EliteRecord) -> bool {
        self.fitness_score > incumbent.fitness_score
            || (self.fitness_score == incumbent.fitness_score
                && self.timestamp > incumbent.timestamp)
    }
}
