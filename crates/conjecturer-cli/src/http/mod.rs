//! HTTP adapters for the external services
//!
//! Every adapter posts JSON and maps transport, status and decode failures
//! onto [`ServiceError`].

mod kimina;
mod models;
pub mod negation;

pub use kimina::{KiminaVerifier, VerifierOptions, DEFAULT_KIMINA_URL};
pub use models::{HttpGenerator, HttpJudge, HttpProver};

use conjecturer::cascade::ServiceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Build a client with a whole-request timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Transport(format!("Failed to build HTTP client: {e}")))
}

/// Join a base URL and an endpoint path without doubling slashes
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST `body` as JSON and decode the reply
pub(crate) async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
) -> Result<Resp, ServiceError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| ServiceError::Transport(format!("{url}: {e}")))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ServiceError::Transport(format!("{url}: {e}")))?;
    if !status.is_success() {
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| ServiceError::Decode(format!("{url}: {e}")))
}
