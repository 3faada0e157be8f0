//! End-to-end tests for the search loop with mock services
//!
//! Statements carry marker words: HARD has a verified prover completion,
//! BROKEN fails to compile, anything else stays open.

use async_trait::async_trait;
use conjecturer::cascade::{
    CheckResult, LeanMessage, NegationRequest, ProverService, ServiceError, Severity, Snippet,
    VerificationService,
};
use conjecturer::scheduler::{OperatorDescriptor, OperatorStats, NOVEL_OPERATOR};
use conjecturer::{
    GeneratedStatement, GenerationOutput, GenerationRequest, GenerationService, JudgeFlags,
    JudgeRequest, JudgeScores, JudgedCandidate, ProvedStatement, QualityJudge, SearchConfig,
    SearchContext, SearchError, SearchLoop, SearchServices,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

// =============================================================================
// Mock services
// =============================================================================

struct MockGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
    operator_name: String,
}

impl MockGenerator {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            operator_name: "generalize".into(),
        }
    }

    fn naming(mut self, name: &str) -> Self {
        self.operator_name = name.into();
        self
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let operator = if request.operator_hint.name == NOVEL_OPERATOR {
            OperatorDescriptor::new(&self.operator_name, "replace constants by variables")
        } else {
            request.operator_hint.clone()
        };
        Ok(GenerationOutput {
            statements: vec![
                GeneratedStatement::ok("theorem a (n : ℕ) : HARD n := by"),
                GeneratedStatement::ok("theorem b : BROKEN := by"),
                GeneratedStatement::ok("theorem c (n : ℕ) : OPEN n := by"),
                GeneratedStatement::failed("no lean code block in response"),
            ],
            operator,
        })
    }
}

struct MockVerifier;

#[async_trait]
impl VerificationService for MockVerifier {
    async fn check(&self, snippets: &[Snippet]) -> Result<Vec<CheckResult>, ServiceError> {
        Ok(snippets
            .iter()
            .map(|s| {
                let code = s.code.as_str();
                let failed = if code.ends_with(" sorry") {
                    code.contains("BROKEN")
                } else if code.ends_with("?\n") {
                    true
                } else {
                    !code.trim_end().ends_with("good")
                };
                if failed {
                    CheckResult::ok(&s.id, vec![LeanMessage::new(Severity::Error, "failed")])
                } else {
                    CheckResult::ok(&s.id, vec![])
                }
            })
            .collect())
    }

    async fn negate(
        &self,
        requests: &[NegationRequest],
    ) -> Result<Vec<Option<String>>, ServiceError> {
        Ok(requests
            .iter()
            .map(|_| Some("theorem neg : ¬ ∀ n : ℕ, OPEN n := by".to_string()))
            .collect())
    }
}

struct MockProver;

#[async_trait]
impl ProverService for MockProver {
    async fn complete(&self, sources: &[String], k: usize) -> Result<Vec<Vec<String>>, ServiceError> {
        Ok(sources
            .iter()
            .map(|s| {
                let proof = if s.contains("HARD") { "good" } else { "bad" };
                vec![proof.to_string(); k]
            })
            .collect())
    }
}

struct MockJudge {
    drop_one: bool,
}

#[async_trait]
impl QualityJudge for MockJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<Vec<JudgedCandidate>, ServiceError> {
        let mut verdicts: Vec<JudgedCandidate> = request
            .statements
            .iter()
            .map(|_| JudgedCandidate {
                scores: JudgeScores {
                    novelty: 70.0,
                    difficulty: 40.0,
                    provability_estimate: 50.0,
                },
                flags: JudgeFlags::default(),
                justification: "new combination of known facts".into(),
            })
            .collect();
        if self.drop_one {
            verdicts.pop();
        }
        Ok(verdicts)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn services(generator: Arc<MockGenerator>, judge: MockJudge) -> SearchServices {
    SearchServices {
        generator,
        verifier: Arc::new(MockVerifier),
        prover: Arc::new(MockProver),
        judge: Arc::new(judge),
    }
}

fn config(dir: &Path) -> SearchConfig {
    let mut config = SearchConfig::in_data_dir(dir);
    config.cascade.k = 2;
    config.seed = Some(17);
    config
}

fn context() -> SearchContext {
    SearchContext::new("Nat/Basic.lean", "import Mathlib\n\nopen Nat\n")
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_iterations_feed_archive_ledger_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockGenerator::new());
    let search = SearchLoop::new(
        config(dir.path()),
        services(generator.clone(), MockJudge { drop_one: false }),
    )
    .unwrap();

    let summaries = search.run(&[context()], 3).await.unwrap();
    assert_eq!(summaries.len(), 3);
    let first = &summaries[0];
    assert_eq!(first.candidates, 4);
    assert_eq!(first.compile_failed, 2);
    assert_eq!(first.non_trivially_provable, 1);
    assert_eq!(first.inconclusive, 1);
    assert_eq!(first.archive_updates, 2);
    assert_eq!(first.operator, "generalize");
    let best = first.best_fitness.unwrap();
    assert!((best - 0.88).abs() < 1e-9, "best fitness {best}");

    // Ledger keeps every candidate, including failures
    let records = search.ledger().load().unwrap();
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.id.is_some() && r.timestamp.is_some()));
    assert_eq!(records[4].iteration, 1);

    {
        let state = search.state().lock().await;
        assert_eq!(state.archive.len(), 2);
        assert_eq!(
            state.operators.get("generalize"),
            Some(OperatorStats {
                successes: 6,
                trials: 12
            })
        );
        assert_eq!(state.catalog.names("Nat/Basic.lean"), vec!["generalize"]);
    }

    // Later iterations mutate an archive parent
    let requests = generator.requests();
    assert!(requests[0].parent_statement.is_none());
    assert!(requests[1].parent_statement.is_some());

    assert!(dir.path().join("program_map.json").exists());
    assert!(dir.path().join("mutations.json").exists());
}

#[tokio::test]
async fn test_proved_statements_extend_the_context() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.grow_context = true;
    let generator = Arc::new(MockGenerator::new());
    let search = SearchLoop::new(
        config,
        services(generator.clone(), MockJudge { drop_one: false }),
    )
    .unwrap();

    let summaries = search.run(&[context()], 2).await.unwrap();
    assert_eq!(
        summaries[0].proved,
        vec![ProvedStatement {
            statement: "theorem a (n : ℕ) : HARD n := by".into(),
            proof: "good".into(),
        }]
    );

    let requests = generator.requests();
    assert_eq!(requests[0].context, "import Mathlib\n\nopen Nat\n");
    assert_eq!(
        requests[1].context,
        "import Mathlib\n\nopen Nat\n\ntheorem a (n : ℕ) : HARD n := by\n  good\n"
    );
    // Same context for catalogue and ledger purposes
    assert_eq!(requests[1].context_id, "Nat/Basic.lean");
}

#[tokio::test]
async fn test_context_is_fixed_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockGenerator::new());
    let search = SearchLoop::new(
        config(dir.path()),
        services(generator.clone(), MockJudge { drop_one: false }),
    )
    .unwrap();

    search.run(&[context()], 2).await.unwrap();
    let requests = generator.requests();
    assert!(requests.iter().all(|r| r.context == context().source));
}

#[test]
fn test_absorb_skips_known_declarations() {
    let mut ctx = context();
    let proved = vec![
        ProvedStatement {
            statement: "theorem a : True := by".into(),
            proof: "trivial".into(),
        },
        ProvedStatement {
            statement: "theorem a : True := by".into(),
            proof: "trivial".into(),
        },
    ];
    assert_eq!(ctx.absorb(&proved), 1);
    assert_eq!(ctx.absorb(&proved), 0);
    assert_eq!(ctx.source.matches("theorem a").count(), 1);
}

#[tokio::test]
async fn test_restore_rebuilds_state() {
    let dir = tempfile::tempdir().unwrap();
    let first = SearchLoop::new(
        config(dir.path()),
        services(Arc::new(MockGenerator::new()), MockJudge { drop_one: false }),
    )
    .unwrap();
    first.run(&[context()], 3).await.unwrap();

    let mut second = SearchLoop::new(
        config(dir.path()),
        services(Arc::new(MockGenerator::new()), MockJudge { drop_one: false }),
    )
    .unwrap();
    let restored = second.restore().await.unwrap();
    assert_eq!(restored.elites, 2);
    assert_eq!(restored.ledger_records, 12);
    assert_eq!(restored.next_step, 3);
    assert_eq!(second.next_step(), 3);

    let state = second.state().lock().await;
    assert_eq!(
        state.operators.get("generalize"),
        Some(OperatorStats {
            successes: 6,
            trials: 12
        })
    );
    assert_eq!(state.catalog.names("Nat/Basic.lean"), vec!["generalize"]);
}

#[tokio::test]
async fn test_island_mode_clears_niches() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.archive.reset_each_iteration = true;
    let generator = Arc::new(MockGenerator::new());
    let search =
        SearchLoop::new(config, services(generator.clone(), MockJudge { drop_one: false })).unwrap();

    search.run(&[context()], 2).await.unwrap();

    // Every iteration starts empty, so the second one finds no archive
    // parent and falls back to the ledger
    let requests = generator.requests();
    assert!(requests[1].parent_statement.is_some());
    let state = search.state().lock().await;
    assert_eq!(state.archive.len(), 2);
}

#[tokio::test]
async fn test_judge_count_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let search = SearchLoop::new(
        config(dir.path()),
        services(Arc::new(MockGenerator::new()), MockJudge { drop_one: true }),
    )
    .unwrap();

    let err = search.run_iteration(&context(), 0).await.unwrap_err();
    assert!(matches!(err, SearchError::Protocol(_)));
    assert!(search.ledger().load().unwrap().is_empty());
}

#[tokio::test]
async fn test_reserved_operator_name_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let search = SearchLoop::new(
        config(dir.path()),
        services(
            Arc::new(MockGenerator::new().naming(NOVEL_OPERATOR)),
            MockJudge { drop_one: false },
        ),
    )
    .unwrap();

    let err = search.run_iteration(&context(), 0).await.unwrap_err();
    assert!(matches!(err, SearchError::Protocol(_)));
}
