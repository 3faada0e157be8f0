//! Kimina Lean server adapter

use async_trait::async_trait;
use conjecturer::cascade::{
    align_by_index, CheckResult, NegationRequest, RawCheckResponse, ServiceError, Snippet,
    VerificationService,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::negation::{extract_negation, negation_snippet};
use super::{build_client, endpoint, post_json};

/// Local default when no URL is configured
pub const DEFAULT_KIMINA_URL: &str = "http://localhost:12332";

/// Batching and timeouts for `/api/check` calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierOptions {
    /// Snippets per request
    pub batch_size: usize,
    /// Requests in flight at once
    pub max_workers: usize,
    /// Per-snippet REPL timeout, forwarded to the server
    pub timeout_secs: u64,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_workers: 16,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckRequest {
    snippets: Vec<Snippet>,
    timeout: u64,
    debug: bool,
}

/// Verifier backed by a kimina-lean-server
#[derive(Debug, Clone)]
pub struct KiminaVerifier {
    client: reqwest::Client,
    check_url: String,
    options: VerifierOptions,
}

impl KiminaVerifier {
    pub fn new(base_url: &str, options: VerifierOptions) -> Result<Self, ServiceError> {
        // Leave room for a full batch of REPL timeouts
        let request_timeout = Duration::from_secs(options.timeout_secs.saturating_mul(2).max(30));
        Ok(Self {
            client: build_client(request_timeout)?,
            check_url: endpoint(base_url, "/api/check"),
            options,
        })
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Send `snippets` in batches, results in batch order
    async fn check_batched(&self, snippets: &[Snippet]) -> Result<Vec<CheckResult>, ServiceError> {
        if snippets.is_empty() {
            return Ok(Vec::new());
        }
        let permits = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        for (batch_no, batch) in snippets.chunks(self.options.batch_size.max(1)).enumerate() {
            let client = self.client.clone();
            let url = self.check_url.clone();
            let permits = Arc::clone(&permits);
            let body = CheckRequest {
                snippets: batch.to_vec(),
                timeout: self.options.timeout_secs,
                debug: false,
            };
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
                let raw: RawCheckResponse = post_json(&client, &url, &body).await?;
                Ok::<_, ServiceError>((batch_no, raw.normalize()))
            });
        }

        let mut batches = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let batch = joined
                .map_err(|e| ServiceError::Transport(format!("check task failed: {e}")))??;
            batches.push(batch);
        }
        batches.sort_by_key(|(batch_no, _)| *batch_no);
        let results: Vec<CheckResult> = batches.into_iter().flat_map(|(_, r)| r).collect();
        debug!(snippets = snippets.len(), results = results.len(), "kimina check finished");
        Ok(results)
    }
}

#[async_trait]
impl VerificationService for KiminaVerifier {
    async fn check(&self, snippets: &[Snippet]) -> Result<Vec<CheckResult>, ServiceError> {
        self.check_batched(snippets).await
    }

    async fn negate(
        &self,
        requests: &[NegationRequest],
    ) -> Result<Vec<Option<String>>, ServiceError> {
        let snippets: Vec<Snippet> = requests
            .iter()
            .enumerate()
            .map(|(i, request)| Snippet::new(i.to_string(), negation_snippet(request, i)))
            .collect();
        let results = self.check_batched(&snippets).await?;
        negations_from_results(results, requests.len())
    }
}

/// One negation per submitted snippet, in submission order
fn negations_from_results(
    results: Vec<CheckResult>,
    expected: usize,
) -> Result<Vec<Option<String>>, ServiceError> {
    let aligned = align_by_index(results, expected)?;
    Ok(aligned
        .iter()
        .map(|result| {
            let negation = extract_negation(result);
            if negation.is_none() {
                warn!(id = result.id, diagnostics = ?result.diagnostics(), "push_neg produced no header");
            }
            negation
        })
        .collect())
}
