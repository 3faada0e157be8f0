//! The search loop
//!
//! One iteration:
//!
//! 1. Snapshot state (island mode clears the archive first)
//! 2. Choose parents and an operator
//! 3. Generate statements and run them through the cascade
//! 4. Judge the non-trivial survivors and merge fitness
//! 5. Update archive and operator stats, append to the ledger
//! 6. Prune and persist

use conjecturer_archive::{EliteRecord, FeatureArchive};
use conjecturer_cascade::{
    Candidate, CandidateIds, ProverService, VerificationCascade, VerificationOutcome,
    VerificationService,
};
use conjecturer_ledger::{LedgerRecord, RunLedger};
use conjecturer_scheduler::{
    OperatorCatalog, OperatorDescriptor, OperatorTable, Parent, ParentSelector, NOVEL_OPERATOR,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::fitness::{FitnessResult, JudgedCandidate};
use crate::services::{GenerationRequest, GenerationService, JudgeRequest, QualityJudge};
use crate::state::{SearchState, SharedSearchState};

/// A Lean file the search generates statements for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    /// Stable name, usually the file path
    pub id: String,
    /// Lean source
    pub source: String,
}

impl SearchContext {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Read a context from disk, named by its path
    pub fn from_file(path: impl Into<PathBuf>) -> SearchResult<Self> {
        let path = path.into();
        let source = std::fs::read_to_string(&path)?;
        Ok(Self::new(path.display().to_string(), source))
    }

    /// Append proved declarations not already in the source
    ///
    /// Returns how many were added.
    pub fn absorb(&mut self, declarations: &[ProvedStatement]) -> usize {
        let mut added = 0;
        for decl in declarations {
            let header = decl.statement.trim();
            if header.is_empty() || self.source.contains(header) {
                continue;
            }
            let source = self.source.trim_end();
            self.source = format!("{source}\n\n{header}\n  {}\n", decl.proof.trim());
            added += 1;
        }
        added
    }
}

/// A statement the cascade proved, with the proof it found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvedStatement {
    pub statement: String,
    pub proof: String,
}

/// External collaborators of the loop
#[derive(Clone)]
pub struct SearchServices {
    pub generator: Arc<dyn GenerationService>,
    pub verifier: Arc<dyn VerificationService>,
    pub prover: Arc<dyn ProverService>,
    pub judge: Arc<dyn QualityJudge>,
}

/// What one iteration did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub context_id: String,
    pub step: u64,
    /// Operator credited with this iteration's candidates
    pub operator: String,
    pub parent_id: Option<String>,
    pub candidates: usize,
    pub compile_failed: usize,
    pub trivially_provable: usize,
    pub non_trivially_provable: usize,
    pub likely_false: usize,
    pub inconclusive: usize,
    /// Elites inserted or replaced
    pub archive_updates: usize,
    pub pruned: usize,
    pub best_fitness: Option<f64>,
    /// Non-trivially provable statements with their proofs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proved: Vec<ProvedStatement>,
}

/// What `restore` found on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub elites: usize,
    pub ledger_records: usize,
    pub next_step: u64,
}

/// Drives generation, verification and selection
pub struct SearchLoop {
    config: SearchConfig,
    state: SharedSearchState,
    ledger: RunLedger,
    services: SearchServices,
    cascade: VerificationCascade,
    parents: ParentSelector,
    ids: CandidateIds,
    next_step: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SearchLoop {
    /// Build the loop with empty in-memory state
    ///
    /// Call [`restore`](Self::restore) to pick up a previous run.
    pub fn new(config: SearchConfig, services: SearchServices) -> SearchResult<Self> {
        config.validate()?;
        let archive = FeatureArchive::new(config.archive.clone())?;
        let mut catalog = OperatorCatalog::open(&config.catalog_path);
        if let Some(seed) = &config.seed_catalog_path {
            let added = catalog.merge_file(seed);
            debug!(seed = %seed.display(), added, "seed operators merged");
        }
        let operators = OperatorTable::new(config.exploration);
        let state = SharedSearchState::new(SearchState::new(archive, operators, catalog));

        let cascade = VerificationCascade::new(
            services.verifier.clone(),
            services.prover.clone(),
            config.cascade.clone(),
        );
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            ledger: RunLedger::new(&config.ledger_path),
            parents: ParentSelector::new(config.min_parent_score),
            state,
            services,
            cascade,
            ids: CandidateIds::default(),
            next_step: AtomicU64::new(0),
            rng: Mutex::new(rng),
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedSearchState {
        &self.state
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Step the next iteration will run as
    pub fn next_step(&self) -> u64 {
        self.next_step.load(Ordering::SeqCst)
    }

    /// Reload the archive and rebuild operator statistics from the ledger
    pub async fn restore(&mut self) -> SearchResult<RestoreSummary> {
        let records = self.ledger.load()?;
        let next_step = records.iter().map(|r| r.iteration + 1).max().unwrap_or(0);
        let next_candidate = records.iter().map(|r| r.candidate_id + 1).max().unwrap_or(0);

        let elites = {
            let mut state = self.state.lock().await;
            state.operators = OperatorTable::from_ledger(&records, self.config.exploration);
            state.archive.load()
        };
        self.ids = CandidateIds::starting_at(next_candidate);
        self.next_step.store(next_step, Ordering::SeqCst);

        let summary = RestoreSummary {
            elites,
            ledger_records: records.len(),
            next_step,
        };
        info!(?summary, "search state restored");
        Ok(summary)
    }

    /// Run `max_iterations` iterations per context, contexts in order
    ///
    /// With `grow_context` set, statements proved in one iteration are part
    /// of the context the next iteration generates against.
    pub async fn run(
        &self,
        contexts: &[SearchContext],
        max_iterations: u64,
    ) -> SearchResult<Vec<IterationSummary>> {
        let mut summaries = Vec::new();
        for context in contexts {
            let mut working = context.clone();
            for _ in 0..max_iterations {
                let step = self.next_step.fetch_add(1, Ordering::SeqCst);
                let summary = self.run_iteration(&working, step).await?;
                if self.config.grow_context {
                    let added = working.absorb(&summary.proved);
                    if added > 0 {
                        debug!(context = %working.id, step, added, "context extended");
                    }
                }
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// One full generate, verify, select cycle
    pub async fn run_iteration(
        &self,
        context: &SearchContext,
        step: u64,
    ) -> SearchResult<IterationSummary> {
        let snapshot = self.state.snapshot(&context.id).await;
        let ledger_records = if snapshot.archive.is_empty() {
            self.ledger.load()?
        } else {
            Vec::new()
        };

        let (parents, operator_name) = {
            let mut rng = self.rng.lock().await;
            let parents = self.parents.choose_parents(
                &snapshot.archive,
                &ledger_records,
                self.config.parents_per_iteration,
                &mut *rng,
            );
            let known: Vec<String> = snapshot
                .known_operators
                .iter()
                .map(|op| op.name.clone())
                .collect();
            let operator = snapshot.operators.choose_operator(&known, step, &mut *rng);
            (parents, operator)
        };
        let parent: Option<&Parent> = parents.first();
        let operator_hint = snapshot
            .known_operators
            .iter()
            .find(|op| op.name == operator_name)
            .cloned()
            .unwrap_or_else(|| OperatorDescriptor::new(NOVEL_OPERATOR, ""));
        info!(
            context = %context.id,
            step,
            operator = %operator_hint.name,
            parent = parent.and_then(|p| p.id.as_deref()).unwrap_or("-"),
            "iteration started"
        );

        let request = GenerationRequest {
            context_id: context.id.clone(),
            context: context.source.clone(),
            operator_hint,
            parent_statement: parent.map(|p| p.statement.clone()),
        };
        let output = self.services.generator.generate(&request).await?;
        output.validate()?;
        let operator = output.operator.clone();

        let mut candidates: Vec<Candidate> = output
            .statements
            .into_iter()
            .map(|generated| {
                let id = self.ids.next_id();
                match generated.into_result() {
                    Ok(statement) => Candidate::new(id, &context.source, statement),
                    Err(error) => Candidate::failed(id, &context.source, error),
                }
            })
            .collect();
        if candidates.is_empty() {
            warn!(context = %context.id, step, "generator returned no statements");
        }

        let report = self.cascade.run(&mut candidates).await?;
        let verdicts = self
            .judge(context, request.parent_statement.clone(), &candidates)
            .await?;

        let fitness: Vec<FitnessResult> = candidates
            .iter()
            .zip(&report.outcomes)
            .zip(&verdicts)
            .map(|((_, outcome), verdict)| self.config.fitness.merge(outcome, verdict.as_ref()))
            .collect();

        let parent_id = parent.and_then(|p| p.id.clone());
        let mut archive_updates = 0;
        {
            let mut state = self.state.lock().await;
            state.catalog.register(&context.id, &operator);
            for ((candidate, outcome), result) in
                candidates.iter().zip(&report.outcomes).zip(&fitness)
            {
                let elite = result.feature_vector.clone().map(|features| {
                    let mut elite = EliteRecord::new(
                        &operator.name,
                        &candidate.statement,
                        result.fitness_score,
                        features,
                    );
                    elite.parent_id = parent_id.clone();
                    elite.valid = outcome.compiled();
                    elite
                });
                if let Some(outcome) = state.record(elite, &operator.name, result.fitness_score) {
                    if outcome.is_accepted() {
                        archive_updates += 1;
                    }
                }
            }
        }

        let records: Vec<LedgerRecord> = candidates
            .iter()
            .zip(&report.outcomes)
            .zip(fitness.iter())
            .map(|((candidate, outcome), result)| LedgerRecord {
                candidate_id: candidate.id,
                feature_vector: result.feature_vector.clone(),
                goal: candidate.goal.clone(),
                flags: result.flags.clone(),
                justification: result.justification.clone(),
                ..LedgerRecord::new(&operator.name, &candidate.statement, outcome.clone())
                    .with_fitness(result.fitness_score)
                    .with_context(&context.id, step)
                    .with_parent(parent_id.clone())
            })
            .collect();
        self.ledger.append_all(records)?;

        let pruned = self.state.lock().await.prune_and_persist()?;

        let summary = IterationSummary {
            context_id: context.id.clone(),
            step,
            operator: operator.name.clone(),
            parent_id,
            candidates: candidates.len(),
            compile_failed: report.count("compile_failed"),
            trivially_provable: report.count("trivially_provable"),
            non_trivially_provable: report.count("non_trivially_provable"),
            likely_false: report.count("likely_false"),
            inconclusive: report.count("inconclusive"),
            archive_updates,
            pruned,
            best_fitness: fitness
                .iter()
                .map(|f| f.fitness_score)
                .fold(None, |best: Option<f64>, f| Some(best.map_or(f, |b| b.max(f)))),
            proved: report
                .outcomes
                .iter()
                .zip(&candidates)
                .filter_map(|(outcome, candidate)| match outcome {
                    VerificationOutcome::NonTriviallyProvable { proof } => Some(ProvedStatement {
                        statement: candidate.statement.clone(),
                        proof: proof.clone(),
                    }),
                    _ => None,
                })
                .collect(),
        };
        info!(
            context = %summary.context_id,
            step,
            operator = %summary.operator,
            candidates = summary.candidates,
            provable = summary.non_trivially_provable,
            likely_false = summary.likely_false,
            archive_updates,
            pruned,
            "iteration finished"
        );
        Ok(summary)
    }

    /// Ask the judge about candidates that compiled and were not trivial
    ///
    /// Returns one optional verdict per candidate.
    async fn judge(
        &self,
        context: &SearchContext,
        parent_statement: Option<String>,
        candidates: &[Candidate],
    ) -> SearchResult<Vec<Option<JudgedCandidate>>> {
        let judged_idx: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.outcome().is_some_and(|o| o.is_non_trivial()))
            .map(|(i, _)| i)
            .collect();
        let mut verdicts: Vec<Option<JudgedCandidate>> = vec![None; candidates.len()];
        if judged_idx.is_empty() {
            return Ok(verdicts);
        }

        let request = JudgeRequest {
            context: context.source.clone(),
            parent_statement,
            statements: judged_idx
                .iter()
                .map(|&i| candidates[i].statement.clone())
                .collect(),
        };
        let replies = self.services.judge.judge(&request).await?;
        if replies.len() != judged_idx.len() {
            return Err(SearchError::protocol(format!(
                "judge returned {} verdicts for {} statements",
                replies.len(),
                judged_idx.len()
            )));
        }
        for (idx, verdict) in judged_idx.into_iter().zip(replies) {
            verdicts[idx] = Some(verdict);
        }
        Ok(verdicts)
    }
}
