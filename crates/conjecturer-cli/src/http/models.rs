//! JSON adapters for the model-backed services
//!
//! Each service is a small HTTP endpoint in front of an LLM:
//!
//! | Service   | Endpoint         | Request                 | Reply                       |
//! |-----------|------------------|-------------------------|-----------------------------|
//! | prover    | `POST /complete` | `{sources, k}`          | `{completions: [[..]]}`     |
//! | generator | `POST /generate` | [`GenerationRequest`]   | [`GenerationOutput`]        |
//! | judge     | `POST /judge`    | [`JudgeRequest`]        | `{verdicts: [..]}`          |

use async_trait::async_trait;
use conjecturer::cascade::{ProverService, ServiceError};
use conjecturer::{
    GenerationOutput, GenerationRequest, GenerationService, JudgeRequest, JudgedCandidate,
    QualityJudge,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{build_client, endpoint, post_json};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    sources: &'a [String],
    k: usize,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    completions: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    verdicts: Vec<JudgedCandidate>,
}

/// Proof-completion model
#[derive(Debug, Clone)]
pub struct HttpProver {
    client: reqwest::Client,
    url: String,
}

impl HttpProver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "/complete"),
        })
    }
}

#[async_trait]
impl ProverService for HttpProver {
    async fn complete(&self, sources: &[String], k: usize) -> Result<Vec<Vec<String>>, ServiceError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let reply: CompletionReply =
            post_json(&self.client, &self.url, &CompletionRequest { sources, k }).await?;
        debug!(sources = sources.len(), k, "completions received");
        Ok(reply.completions)
    }
}

/// Statement generator
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "/generate"),
        })
    }
}

#[async_trait]
impl GenerationService for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ServiceError> {
        post_json(&self.client, &self.url, request).await
    }
}

/// Quality judge
#[derive(Debug, Clone)]
pub struct HttpJudge {
    client: reqwest::Client,
    url: String,
}

impl HttpJudge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "/judge"),
        })
    }
}

#[async_trait]
impl QualityJudge for HttpJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<Vec<JudgedCandidate>, ServiceError> {
        if request.statements.is_empty() {
            return Ok(Vec::new());
        }
        let reply: JudgeReply = post_json(&self.client, &self.url, request).await?;
        Ok(reply.verdicts)
    }
}
