//! Integration tests for conjecturer-cascade
//!
//! These tests drive the full cascade against scripted services:
//! - Stage ordering and early exit for resolved candidates
//! - pass@k selection of the shortest verified completion
//! - Negation search and inconclusive fallbacks
//! - Fatal protocol violations, service failures and timeouts

use async_trait::async_trait;
use conjecturer_cascade::{
    Candidate, CascadeConfig, CascadeError, CheckResult, LeanMessage, NegationRequest,
    ProtocolError, ProverService, ServiceError, Severity, Snippet, SorryInfo, Stage, VerificationCascade,
    VerificationOutcome, VerificationService,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Scripted services
// =============================================================================
//
// Statements carry marker words that decide how the mocks answer:
// BROKEN fails to compile, EASY1 / EASY2 close with the first / second cheap
// tactic, HARD has a verified prover completion, FALSE has a provable
// negation, NONEG cannot be negated.

/// Mock Lean server answering from the snippet text
#[derive(Default)]
struct MockVerifier {
    checks: Mutex<Vec<Vec<Snippet>>>,
    negations: AtomicUsize,
    rewrite_pass_at_k_id: Option<String>,
    drop_last_result: bool,
    delay: Option<Duration>,
    fail: bool,
    negation_id: Option<String>,
    negation_requests: Mutex<Vec<NegationRequest>>,
}

impl MockVerifier {
    fn new() -> Self {
        Self::default()
    }

    fn with_pass_at_k_id(mut self, id: &str) -> Self {
        self.rewrite_pass_at_k_id = Some(id.to_string());
        self
    }

    fn dropping_last_result(mut self) -> Self {
        self.drop_last_result = true;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// push_neg batch answered under `id` instead of the submitted one
    fn with_negation_id(mut self, id: &str) -> Self {
        self.negation_id = Some(id.to_string());
        self
    }

    fn check_batches(&self) -> Vec<Vec<Snippet>> {
        self.checks.lock().unwrap().clone()
    }

    fn answer(&self, snippet: &Snippet) -> CheckResult {
        let code = snippet.code.as_str();
        let id = snippet.id.clone();
        if let Some(statement) = code.strip_suffix(" sorry") {
            if statement.contains("BROKEN") {
                return CheckResult::ok(
                    id,
                    vec![LeanMessage::new(Severity::Error, "unexpected token ':='")],
                );
            }
            return CheckResult::ok(
                id,
                vec![LeanMessage::new(Severity::Warning, "declaration uses 'sorry'")],
            )
            .with_sorries(vec![SorryInfo {
                goal: "⊢ True".to_string(),
                proof_state: Some(0),
                pos: None,
            }]);
        }
        if code.ends_with(" exact?\n") {
            if code.contains("EASY1") {
                return CheckResult::ok(
                    id,
                    vec![LeanMessage::new(Severity::Info, "Try this: exact foo")],
                );
            }
            return CheckResult::ok(
                id,
                vec![LeanMessage::new(Severity::Error, "`exact?` could not close the goal")],
            );
        }
        if code.ends_with(" aesop?\n") {
            if code.contains("EASY2") {
                return CheckResult::ok(
                    id,
                    vec![LeanMessage::new(Severity::Info, "Try this: simp_all")],
                );
            }
            if code.contains("HALFDONE") {
                return CheckResult::ok(
                    id,
                    vec![LeanMessage::new(Severity::Info, "Try this: intro h\n  sorry")],
                );
            }
            return CheckResult::ok(
                id,
                vec![LeanMessage::new(Severity::Error, "aesop: failed to prove the goal")],
            );
        }
        // pass@k: the proof is the last line
        let proof = code.trim_end().lines().last().unwrap_or_default();
        if proof.starts_with("good") {
            CheckResult::ok(id, vec![])
        } else if proof.starts_with("sorryish") {
            CheckResult::ok(
                id,
                vec![LeanMessage::new(Severity::Warning, "declaration uses 'sorry'")],
            )
        } else {
            CheckResult::ok(id, vec![LeanMessage::new(Severity::Error, "unsolved goals")])
        }
    }
}

#[async_trait]
impl VerificationService for MockVerifier {
    async fn check(&self, snippets: &[Snippet]) -> Result<Vec<CheckResult>, ServiceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ServiceError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        self.checks.lock().unwrap().push(snippets.to_vec());

        let pass_at_k = snippets.first().is_some_and(|s| s.id.contains(':'));
        let mut results: Vec<CheckResult> = snippets.iter().map(|s| self.answer(s)).collect();
        // Answer out of order, as a pooled server does
        results.reverse();
        if pass_at_k {
            if let Some(id) = &self.rewrite_pass_at_k_id {
                results[0].id = id.clone();
            }
            if self.drop_last_result {
                results.pop();
            }
        }
        Ok(results)
    }

    async fn negate(
        &self,
        requests: &[NegationRequest],
    ) -> Result<Vec<Option<String>>, ServiceError> {
        self.negations.fetch_add(1, Ordering::SeqCst);
        self.negation_requests
            .lock()
            .unwrap()
            .extend(requests.iter().cloned());
        if let Some(id) = &self.negation_id {
            return Err(ProtocolError::MalformedId(id.clone()).into());
        }
        Ok(requests
            .iter()
            .map(|request| {
                let source = request.source();
                if source.contains("NONEG") {
                    None
                } else if source.contains("FALSE") {
                    Some("theorem t_neg : ¬ FALSE REFUTED := by".to_string())
                } else {
                    Some("theorem t_neg : ¬ OPEN := by".to_string())
                }
            })
            .collect())
    }
}

/// Mock prover with canned completions
#[derive(Default)]
struct MockProver {
    requests: Mutex<Vec<Vec<String>>>,
    short_by_one: bool,
}

impl MockProver {
    fn new() -> Self {
        Self::default()
    }

    fn short_by_one(mut self) -> Self {
        self.short_by_one = true;
        self
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ProverService for MockProver {
    async fn complete(&self, sources: &[String], k: usize) -> Result<Vec<Vec<String>>, ServiceError> {
        self.requests.lock().unwrap().push(sources.to_vec());
        let mut out: Vec<Vec<String>> = sources
            .iter()
            .map(|source| {
                let script: &[&str] = if source.contains("HARD") {
                    &["bad", "good_but_long_proof", "good"]
                } else if source.contains("REFUTED") {
                    &["bad", "bad", "good_refutation"]
                } else if source.contains("SORRYPROOF") {
                    &["sorryish"]
                } else {
                    &["bad"]
                };
                (0..k)
                    .map(|j| script.get(j).copied().unwrap_or("bad").to_string())
                    .collect()
            })
            .collect();
        if self.short_by_one {
            out.pop();
        }
        Ok(out)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn candidate(id: u64, marker: &str) -> Candidate {
    Candidate::new(
        id,
        "import Mathlib\n",
        format!("theorem t{id} : {marker} := by"),
    )
}

fn config() -> CascadeConfig {
    CascadeConfig::with_k(3)
}

fn cascade(verifier: &Arc<MockVerifier>, prover: &Arc<MockProver>) -> VerificationCascade {
    VerificationCascade::new(verifier.clone(), prover.clone(), config())
}

// =============================================================================
// Stage behaviour
// =============================================================================

#[tokio::test]
async fn test_compile_failure_stops_the_cascade() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "BROKEN")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    match &report.outcomes[0] {
        VerificationOutcome::CompileFailed { diagnostics } => {
            assert_eq!(diagnostics, &vec!["unexpected token ':='".to_string()]);
        }
        other => panic!("expected compile failure, got {other:?}"),
    }
    assert_eq!(verifier.check_batches().len(), 1);
    assert_eq!(prover.calls(), 0);
    assert_eq!(verifier.negations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_compile_stage_submits_sorry_proofs() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "EASY1")];

    cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    let batches = verifier.check_batches();
    assert_eq!(batches[0][0].id, "0");
    assert_eq!(
        batches[0][0].code,
        "import Mathlib\n\ntheorem t0 : EASY1 := by sorry"
    );
    assert_eq!(
        batches[1][0].code,
        "import Mathlib\n\ntheorem t0 : EASY1 := by exact?\n"
    );
    assert_eq!(candidates[0].goal.as_deref(), Some("⊢ True"));
}

#[tokio::test]
async fn test_first_cheap_tactic_skips_the_prover() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "EASY1")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert_eq!(
        report.outcomes[0],
        VerificationOutcome::TriviallyProvable {
            stage: 1,
            proof: "exact foo".into()
        }
    );
    assert_eq!(verifier.check_batches().len(), 2);
    assert_eq!(prover.calls(), 0);
}

#[tokio::test]
async fn test_second_cheap_tactic_and_sorry_suggestions() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "EASY2"), candidate(1, "HALFDONE")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert_eq!(
        report.outcomes[0],
        VerificationOutcome::TriviallyProvable {
            stage: 2,
            proof: "simp_all".into()
        }
    );
    // A suggestion still containing sorry is not a proof
    assert_eq!(report.outcomes[1], VerificationOutcome::Inconclusive);
    assert_eq!(report.counts.proof_search, 1);
}

#[tokio::test]
async fn test_pass_at_k_keeps_shortest_verified_completion() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "HARD")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert_eq!(
        report.outcomes[0],
        VerificationOutcome::NonTriviallyProvable {
            proof: "good".into()
        }
    );
    let batches = verifier.check_batches();
    let pass_at_k = &batches[3];
    let ids: Vec<&str> = pass_at_k.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["0:0", "0:1", "0:2"]);
    assert_eq!(
        pass_at_k[2].code,
        "import Mathlib\n\ntheorem t0 : HARD := by\ngood\n"
    );
    assert_eq!(verifier.negations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sorry_completions_are_rejected_by_default() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "SORRYPROOF")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();
    assert_eq!(report.outcomes[0], VerificationOutcome::Inconclusive);

    let lenient = VerificationCascade::new(
        verifier.clone(),
        prover.clone(),
        CascadeConfig {
            accept_sorry: true,
            ..config()
        },
    );
    let mut candidates = vec![candidate(0, "SORRYPROOF")];
    let report = lenient.run(&mut candidates).await.unwrap();
    assert_eq!(
        report.outcomes[0],
        VerificationOutcome::NonTriviallyProvable {
            proof: "sorryish".into()
        }
    );
}

#[tokio::test]
async fn test_negation_search_finds_likely_false() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "FALSE")];

    // 0/8 forward completions verify, 1/8 negated completions verify
    let cascade = VerificationCascade::new(verifier.clone(), prover.clone(), CascadeConfig::with_k(8));
    let report = cascade.run(&mut candidates).await.unwrap();

    assert_eq!(
        report.outcomes[0],
        VerificationOutcome::LikelyFalse {
            negated_statement: "theorem t_neg : ¬ FALSE REFUTED := by".into(),
            proof: "good_refutation".into(),
        }
    );
    // Forward search and negated search
    assert_eq!(prover.calls(), 2);
    let requests = prover.requests.lock().unwrap().clone();
    assert_eq!(
        requests[1][0],
        "import Mathlib\n\ntheorem t_neg : ¬ FALSE REFUTED := by"
    );
    // Context and statement reach the negator separately
    let negated = verifier.negation_requests.lock().unwrap().clone();
    assert_eq!(negated, vec![NegationRequest::new("import Mathlib\n", "theorem t0 : FALSE := by")]);
}

#[tokio::test]
async fn test_unnegatable_statement_is_inconclusive() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "NONEG")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert_eq!(report.outcomes[0], VerificationOutcome::Inconclusive);
    // Nothing left to search after negation failed
    assert_eq!(prover.calls(), 1);
}

#[tokio::test]
async fn test_every_candidate_gets_exactly_one_outcome() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![
        candidate(0, "BROKEN"),
        candidate(1, "EASY1"),
        candidate(2, "EASY2"),
        candidate(3, "HARD"),
        candidate(4, "FALSE"),
        candidate(5, "OPEN"),
        candidate(6, "NONEG"),
        Candidate::failed(7, "import Mathlib\n", "no theorem in response"),
    ];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    let labels: Vec<&str> = report.outcomes.iter().map(VerificationOutcome::label).collect();
    assert_eq!(
        labels,
        vec![
            "compile_failed",
            "trivially_provable",
            "trivially_provable",
            "non_trivially_provable",
            "likely_false",
            "inconclusive",
            "inconclusive",
            "compile_failed",
        ]
    );
    assert!(candidates.iter().all(Candidate::is_resolved));
    assert_eq!(report.counts.compile, 7);
    assert_eq!(report.counts.cheap_tactic_1, 6);
    assert_eq!(report.counts.cheap_tactic_2, 5);
    assert_eq!(report.counts.proof_search, 4);
    assert_eq!(report.counts.negation_search, 3);
}

#[tokio::test]
async fn test_resolved_candidates_are_not_resubmitted() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut done = candidate(0, "EASY1");
    done.resolve(VerificationOutcome::Inconclusive);
    let mut candidates = vec![done, candidate(1, "EASY1")];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert_eq!(report.outcomes[0], VerificationOutcome::Inconclusive);
    assert_eq!(report.outcomes[1].label(), "trivially_provable");
    let batches = verifier.check_batches();
    assert_eq!(batches[0].len(), 1);
    assert!(batches[0][0].code.contains("t1"));
}

#[tokio::test]
async fn test_empty_batch_makes_no_calls() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new());
    let mut candidates: Vec<Candidate> = vec![];

    let report = cascade(&verifier, &prover).run(&mut candidates).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(verifier.check_batches().is_empty());
    assert_eq!(prover.calls(), 0);
}

// =============================================================================
// Fatal errors
// =============================================================================

#[tokio::test]
async fn test_malformed_pass_at_k_id_is_fatal() {
    let verifier = Arc::new(MockVerifier::new().with_pass_at_k_id("abc"));
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "HARD")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();

    match err {
        CascadeError::Protocol { stage, source } => {
            assert_eq!(stage, Stage::ProofSearch);
            assert_eq!(source, ProtocolError::MalformedId("abc".into()));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(!candidates[0].is_resolved());
}

#[tokio::test]
async fn test_malformed_negation_id_is_fatal() {
    let verifier = Arc::new(MockVerifier::new().with_negation_id("x"));
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "OPEN")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();

    match err {
        CascadeError::Protocol { stage, source } => {
            assert_eq!(stage, Stage::NegationSearch);
            assert_eq!(source, ProtocolError::MalformedId("x".into()));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(!candidates[0].is_resolved());
}

#[tokio::test]
async fn test_out_of_range_pass_at_k_id_is_fatal() {
    let verifier = Arc::new(MockVerifier::new().with_pass_at_k_id("4:0"));
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "HARD")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CascadeError::Protocol {
            source: ProtocolError::UnknownId(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_pass_at_k_result_is_fatal() {
    let verifier = Arc::new(MockVerifier::new().dropping_last_result());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "HARD")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CascadeError::Protocol {
            source: ProtocolError::MissingResult(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_prover_arity_mismatch_is_fatal() {
    let verifier = Arc::new(MockVerifier::new());
    let prover = Arc::new(MockProver::new().short_by_one());
    let mut candidates = vec![candidate(0, "HARD"), candidate(1, "OPEN")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CascadeError::Protocol {
            stage: Stage::ProofSearch,
            source: ProtocolError::ArityMismatch {
                service: "prover",
                expected: 2,
                got: 1
            }
        }
    ));
}

#[tokio::test]
async fn test_service_failure_propagates() {
    let verifier = Arc::new(MockVerifier::new().failing());
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "OPEN")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Compile);
    assert!(matches!(
        err,
        CascadeError::Service {
            source: ServiceError::Status { status: 503, .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_batch_times_out() {
    let verifier = Arc::new(MockVerifier::new().with_delay(Duration::from_secs(600)));
    let prover = Arc::new(MockProver::new());
    let mut candidates = vec![candidate(0, "OPEN")];

    let err = cascade(&verifier, &prover)
        .run(&mut candidates)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CascadeError::Timeout {
            stage: Stage::Compile,
            ..
        }
    ));
}
