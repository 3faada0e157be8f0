//! The staged verification cascade
//!
//! Every candidate walks the same ladder, cheapest stage first:
//!
//! ```text
//! compile ─┬─ error ──────────────────────────────▶ CompileFailed
//!          └─ exact? ─┬─ suggestion ──────────────▶ TriviallyProvable(1)
//!                     └─ aesop? ─┬─ suggestion ───▶ TriviallyProvable(2)
//!                                └─ pass@k ─┬─ ok ▶ NonTriviallyProvable
//!                                           └─ negation pass@k ─┬─ ok ▶ LikelyFalse
//!                                                               └─────▶ Inconclusive
//! ```
//!
//! Each arrow is one batched round trip covering all candidates still open
//! at that stage. Terminal candidates never appear in a later batch.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::batch::{align_by_index, regroup, CompositeId, ProtocolError};
use crate::candidate::Candidate;
use crate::outcome::{Stage, VerificationOutcome};
use crate::response::CheckResult;
use crate::service::{
    NegationRequest, ProverService, ServiceError, Snippet, VerificationService,
};

/// Errors that abort a cascade run
#[derive(Error, Debug)]
pub enum CascadeError {
    /// A reply broke the batch contract
    #[error("Protocol violation during {stage}: {source}")]
    Protocol {
        stage: Stage,
        #[source]
        source: ProtocolError,
    },
    /// A service call failed
    #[error("Service failure during {stage}: {source}")]
    Service {
        stage: Stage,
        #[source]
        source: ServiceError,
    },
    /// A batch did not return within the stage timeout
    #[error("{stage} batch timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl CascadeError {
    /// Stage the failure happened in
    pub fn stage(&self) -> Stage {
        match self {
            Self::Protocol { stage, .. } | Self::Service { stage, .. } | Self::Timeout { stage, .. } => {
                *stage
            }
        }
    }
}

/// Configuration for the cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Prover completions sampled per open statement
    pub k: usize,
    /// Count proofs that still contain `sorry` as verified
    pub accept_sorry: bool,
    /// Timeout for each batched service call
    pub stage_timeout_secs: u64,
    /// Tactic tried at the first cheap stage
    pub first_tactic: String,
    /// Tactic tried at the second cheap stage
    pub second_tactic: String,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            k: 8,
            accept_sorry: false,
            stage_timeout_secs: 300,
            first_tactic: "exact?".to_string(),
            second_tactic: "aesop?".to_string(),
        }
    }
}

impl CascadeConfig {
    /// Config sampling `k` completions per statement
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Stage timeout as a duration
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// How many candidates each stage submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub compile: usize,
    pub cheap_tactic_1: usize,
    pub cheap_tactic_2: usize,
    pub proof_search: usize,
    pub negation_search: usize,
}

/// Result of one cascade run
#[derive(Debug, Clone)]
pub struct CascadeReport {
    /// One outcome per input candidate, in input order
    pub outcomes: Vec<VerificationOutcome>,
    /// Candidates submitted per stage
    pub counts: StageCounts,
}

impl CascadeReport {
    /// Number of outcomes with the given label
    pub fn count(&self, label: &str) -> usize {
        self.outcomes.iter().filter(|o| o.label() == label).count()
    }
}

/// Staged verifier over a Lean server and a prover model
pub struct VerificationCascade {
    verifier: Arc<dyn VerificationService>,
    prover: Arc<dyn ProverService>,
    config: CascadeConfig,
}

impl VerificationCascade {
    pub fn new(
        verifier: Arc<dyn VerificationService>,
        prover: Arc<dyn ProverService>,
        config: CascadeConfig,
    ) -> Self {
        Self {
            verifier,
            prover,
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Classify every unresolved candidate
    ///
    /// Candidates already resolved keep their outcome and are not
    /// resubmitted. On error no outcome from the failing batch is applied;
    /// candidates closed by earlier stages stay resolved.
    pub async fn run(&self, candidates: &mut [Candidate]) -> Result<CascadeReport, CascadeError> {
        let mut counts = StageCounts::default();

        let mut open: Vec<usize> = Vec::new();
        for (idx, candidate) in candidates.iter_mut().enumerate() {
            if candidate.is_resolved() {
                continue;
            }
            if let Some(err) = &candidate.generation_error {
                let diagnostics = vec![format!("generation failed: {err}")];
                candidate.resolve(VerificationOutcome::CompileFailed { diagnostics });
                continue;
            }
            open.push(idx);
        }

        open = self.compile_stage(candidates, open, &mut counts).await?;
        open = self
            .tactic_stage(Stage::CheapTactic1, candidates, open, &mut counts)
            .await?;
        open = self
            .tactic_stage(Stage::CheapTactic2, candidates, open, &mut counts)
            .await?;
        open = self.proof_search_stage(candidates, open, &mut counts).await?;
        self.negation_stage(candidates, open, &mut counts).await?;

        let outcomes: Vec<VerificationOutcome> = candidates
            .iter()
            .map(|c| c.outcome().cloned().unwrap_or(VerificationOutcome::Inconclusive))
            .collect();
        let report = CascadeReport { outcomes, counts };
        info!(
            candidates = candidates.len(),
            compile_failed = report.count("compile_failed"),
            trivial = report.count("trivially_provable"),
            provable = report.count("non_trivially_provable"),
            likely_false = report.count("likely_false"),
            inconclusive = report.count("inconclusive"),
            "cascade finished"
        );
        Ok(report)
    }

    async fn compile_stage(
        &self,
        candidates: &mut [Candidate],
        open: Vec<usize>,
        counts: &mut StageCounts,
    ) -> Result<Vec<usize>, CascadeError> {
        if open.is_empty() {
            return Ok(open);
        }
        counts.compile = open.len();
        let snippets = stage_snippets(candidates, &open, |code| format!("{} sorry", code.trim_end()));
        let results = self.check_aligned(Stage::Compile, &snippets).await?;

        let mut still_open = Vec::new();
        for (idx, result) in open.into_iter().zip(results) {
            let candidate = &mut candidates[idx];
            if result.has_errors() {
                debug!(id = candidate.id, "compile failed");
                candidate.resolve(VerificationOutcome::CompileFailed {
                    diagnostics: result.diagnostics(),
                });
            } else {
                candidate.goal = result.first_goal().map(str::to_string);
                still_open.push(idx);
            }
        }
        Ok(still_open)
    }

    async fn tactic_stage(
        &self,
        stage: Stage,
        candidates: &mut [Candidate],
        open: Vec<usize>,
        counts: &mut StageCounts,
    ) -> Result<Vec<usize>, CascadeError> {
        if open.is_empty() {
            return Ok(open);
        }
        let (tactic, stage_no, reject_sorry) = match stage {
            Stage::CheapTactic1 => {
                counts.cheap_tactic_1 = open.len();
                (self.config.first_tactic.as_str(), 1, false)
            }
            _ => {
                counts.cheap_tactic_2 = open.len();
                (self.config.second_tactic.as_str(), 2, true)
            }
        };
        let snippets = stage_snippets(candidates, &open, |code| {
            format!("{} {tactic}\n", code.trim_end())
        });
        let results = self.check_aligned(stage, &snippets).await?;

        let mut still_open = Vec::new();
        for (idx, result) in open.into_iter().zip(results) {
            match result.suggested_proof(reject_sorry) {
                Some(proof) => {
                    debug!(id = candidates[idx].id, %stage, "closed by cheap tactic");
                    candidates[idx].resolve(VerificationOutcome::TriviallyProvable {
                        stage: stage_no,
                        proof,
                    });
                }
                None => still_open.push(idx),
            }
        }
        Ok(still_open)
    }

    async fn proof_search_stage(
        &self,
        candidates: &mut [Candidate],
        open: Vec<usize>,
        counts: &mut StageCounts,
    ) -> Result<Vec<usize>, CascadeError> {
        if open.is_empty() {
            return Ok(open);
        }
        counts.proof_search = open.len();
        let sources: Vec<String> = open.iter().map(|&i| candidates[i].code()).collect();
        let best = self.pass_at_k(Stage::ProofSearch, &sources).await?;

        let mut still_open = Vec::new();
        for (idx, proof) in open.into_iter().zip(best) {
            match proof {
                Some(proof) => {
                    candidates[idx].resolve(VerificationOutcome::NonTriviallyProvable { proof });
                }
                None => still_open.push(idx),
            }
        }
        Ok(still_open)
    }

    async fn negation_stage(
        &self,
        candidates: &mut [Candidate],
        open: Vec<usize>,
        counts: &mut StageCounts,
    ) -> Result<(), CascadeError> {
        if open.is_empty() {
            return Ok(());
        }
        counts.negation_search = open.len();
        let requests: Vec<NegationRequest> =
            open.iter().map(|&i| candidates[i].negation_request()).collect();
        let negated = self
            .call(Stage::NegationSearch, self.verifier.negate(&requests))
            .await?;
        if negated.len() != requests.len() {
            return Err(CascadeError::Protocol {
                stage: Stage::NegationSearch,
                source: ProtocolError::ArityMismatch {
                    service: "negation",
                    expected: requests.len(),
                    got: negated.len(),
                },
            });
        }

        // Only statements the server could negate go to the prover
        let mut searchable: Vec<(usize, String)> = Vec::new();
        for (idx, negation) in open.iter().copied().zip(negated) {
            match negation {
                Some(statement) => searchable.push((idx, statement)),
                None => {
                    warn!(id = candidates[idx].id, "negation unavailable");
                    candidates[idx].resolve(VerificationOutcome::Inconclusive);
                }
            }
        }

        let negated_sources: Vec<String> = searchable
            .iter()
            .map(|(idx, statement)| candidates[*idx].code_with_statement(statement))
            .collect();
        let best = if negated_sources.is_empty() {
            Vec::new()
        } else {
            self.pass_at_k(Stage::NegationSearch, &negated_sources).await?
        };

        for ((idx, statement), proof) in searchable.into_iter().zip(best) {
            let outcome = match proof {
                Some(proof) => VerificationOutcome::LikelyFalse {
                    negated_statement: statement,
                    proof,
                },
                None => VerificationOutcome::Inconclusive,
            };
            candidates[idx].resolve(outcome);
        }
        Ok(())
    }

    /// Sample `k` completions per source, check them in one flat batch, and
    /// return the shortest verified completion per source
    async fn pass_at_k(
        &self,
        stage: Stage,
        sources: &[String],
    ) -> Result<Vec<Option<String>>, CascadeError> {
        let completions = self
            .call(stage, self.prover.complete(sources, self.config.k))
            .await?;
        if completions.len() != sources.len() {
            return Err(CascadeError::Protocol {
                stage,
                source: ProtocolError::ArityMismatch {
                    service: "prover",
                    expected: sources.len(),
                    got: completions.len(),
                },
            });
        }

        let mut snippets = Vec::new();
        for (i, (source, proofs)) in sources.iter().zip(&completions).enumerate() {
            let statement = source.trim_end();
            for (j, proof) in proofs.iter().enumerate() {
                let id = CompositeId::new(i, j).to_string();
                snippets.push(Snippet::new(id, format!("{statement}\n{}\n", proof.trim())));
            }
        }
        if snippets.is_empty() {
            return Ok(vec![None; sources.len()]);
        }

        let shape: Vec<usize> = completions.iter().map(Vec::len).collect();
        let results = self.call(stage, self.verifier.check(&snippets)).await?;
        let grid = regroup(results, &shape).map_err(|source| CascadeError::Protocol { stage, source })?;

        let accept_sorry = self.config.accept_sorry;
        let best = grid
            .iter()
            .zip(&completions)
            .map(|(row, proofs)| {
                row.iter()
                    .zip(proofs)
                    .filter(|(result, _)| result.is_verified(accept_sorry))
                    .map(|(_, proof)| proof.trim())
                    // min_by_key keeps the first of equally short proofs
                    .min_by_key(|proof| proof.len())
                    .map(str::to_string)
            })
            .collect::<Vec<_>>();
        debug!(
            %stage,
            statements = sources.len(),
            verified = best.iter().filter(|b| b.is_some()).count(),
            "pass@k batch checked"
        );
        Ok(best)
    }

    async fn check_aligned(
        &self,
        stage: Stage,
        snippets: &[Snippet],
    ) -> Result<Vec<CheckResult>, CascadeError> {
        let results = self.call(stage, self.verifier.check(snippets)).await?;
        align_by_index(results, snippets.len()).map_err(|source| CascadeError::Protocol { stage, source })
    }

    async fn call<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, CascadeError> {
        let after = self.config.stage_timeout();
        match tokio::time::timeout(after, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ServiceError::Protocol(source))) => Err(CascadeError::Protocol { stage, source }),
            Ok(Err(source)) => Err(CascadeError::Service { stage, source }),
            Err(_) => Err(CascadeError::Timeout { stage, after }),
        }
    }
}

fn stage_snippets(
    candidates: &[Candidate],
    open: &[usize],
    build: impl Fn(&str) -> String,
) -> Vec<Snippet> {
    open.iter()
        .enumerate()
        .map(|(pos, &idx)| Snippet::new(pos.to_string(), build(&candidates[idx].code())))
        .collect()
}
