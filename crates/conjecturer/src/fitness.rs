//! Fitness merge
//!
//! Combines the cascade outcome with the quality judge's scores into the
//! scalar fitness that drives archive replacement and operator rewards, and
//! into the feature vector that places the candidate in a niche.

use conjecturer_archive::{FeatureVector, MAX_SCORE};
use conjecturer_cascade::VerificationOutcome;
use serde::{Deserialize, Serialize};

/// Judge scores, each in [0, 100]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeScores {
    pub novelty: f64,
    pub difficulty: f64,
    pub provability_estimate: f64,
}

/// Judge red flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeFlags {
    /// The statement does not typecheck as intended
    pub ill_typed: bool,
    /// The statement restates a known lemma
    pub restatement: bool,
    /// The statement follows a trivial template
    pub trivial_pattern: bool,
}

impl JudgeFlags {
    /// Names of the raised flags
    pub fn raised(&self) -> Vec<String> {
        [
            ("ill_typed", self.ill_typed),
            ("restatement", self.restatement),
            ("trivial_pattern", self.trivial_pattern),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name.to_string())
        .collect()
    }

    fn caps_interest(&self) -> bool {
        self.ill_typed || self.restatement || self.trivial_pattern
    }
}

/// Judge verdict for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgedCandidate {
    #[serde(default)]
    pub scores: JudgeScores,
    #[serde(default)]
    pub flags: JudgeFlags,
    #[serde(default)]
    pub justification: String,
}

/// Merged fitness for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessResult {
    /// Scalar fitness in [0, 1]
    pub fitness_score: f64,
    /// Quantised, capped judge scores plus verifiability; `None` if unjudged
    pub feature_vector: Option<FeatureVector>,
    /// Quantised weighted judge score in [0, 100]
    pub overall: Option<f64>,
    /// Full proof search settled the statement either way
    pub verifiability: bool,
    pub flags: Vec<String>,
    pub justification: Option<String>,
}

impl FitnessResult {
    /// Fitness for a candidate the judge never saw
    pub fn unjudged() -> Self {
        Self {
            fitness_score: 0.0,
            feature_vector: None,
            overall: None,
            verifiability: false,
            flags: Vec::new(),
            justification: None,
        }
    }
}

/// Weights of the fitness merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Weight of the judge's overall score
    pub llm_overall_weight: f64,
    /// Weight of the verifiability bit
    pub verifiability_weight: f64,
    pub novelty_weight: f64,
    pub difficulty_weight: f64,
    pub provability_weight: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            llm_overall_weight: 0.4,
            verifiability_weight: 0.6,
            novelty_weight: 0.8,
            difficulty_weight: 0.1,
            provability_weight: 0.1,
        }
    }
}

/// Clamp to [0, 100] and round to a multiple of 5, halves rounding down
pub fn quantize(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    let x = score.clamp(0.0, MAX_SCORE);
    ((x / 5.0 + 0.499).floor() * 5.0).clamp(0.0, MAX_SCORE)
}

impl FitnessConfig {
    /// Merge the cascade outcome with an optional judge verdict
    pub fn merge(
        &self,
        outcome: &VerificationOutcome,
        judged: Option<&JudgedCandidate>,
    ) -> FitnessResult {
        let Some(judged) = judged else {
            return FitnessResult::unjudged();
        };
        let flags = judged.flags;

        let mut novelty = quantize(judged.scores.novelty);
        let mut difficulty = quantize(judged.scores.difficulty);
        let mut provability = match outcome {
            VerificationOutcome::NonTriviallyProvable { .. } => MAX_SCORE,
            VerificationOutcome::LikelyFalse { .. } => 0.0,
            _ => quantize(judged.scores.provability_estimate),
        };

        if flags.ill_typed {
            provability = 0.0;
        }
        if flags.caps_interest() {
            novelty = 0.0;
            difficulty = 0.0;
        }

        let overall = if flags.caps_interest() {
            0.0
        } else {
            quantize(
                self.novelty_weight * novelty
                    + self.difficulty_weight * difficulty
                    + self.provability_weight * provability,
            )
        };
        let verifiability = outcome.is_settled();
        let verifiability_score = if verifiability { 1.0 } else { 0.0 };
        let fitness_score = self.llm_overall_weight * overall / MAX_SCORE
            + self.verifiability_weight * verifiability_score;

        let feature_vector = FeatureVector::new()
            .with("novelty", novelty)
            .with("difficulty", difficulty)
            .with("provability_estimate", provability)
            .with("verifiability", verifiability_score * MAX_SCORE);

        FitnessResult {
            fitness_score,
            feature_vector: Some(feature_vector),
            overall: Some(overall),
            verifiability,
            flags: flags.raised(),
            justification: Some(judged.justification.clone()).filter(|j| !j.is_empty()),
        }
    }
}
