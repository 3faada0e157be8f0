//! Lean REPL response model
//!
//! The verification server has shipped two response shapes over time: a
//! legacy flat list of results, and a structured `{ "results": [...] }`
//! object whose per-item `response` may be either a REPL payload or an
//! error object. Both are decoded into [`RawCheckResponse`] and normalised
//! into [`CheckResult`] right at the service boundary.

use serde::{Deserialize, Serialize};

/// Marker Lean prints in front of a tactic suggestion
pub const SUGGESTION_MARKER: &str = "Try this:";

/// Keyword of the unresolved-proof placeholder
pub const SORRY: &str = "sorry";

/// Severity of a Lean message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational output (`#eval`, tactic suggestions)
    Info,
    /// Warning (including `declaration uses 'sorry'`)
    Warning,
    /// Elaboration error
    Error,
    /// Any severity this crate does not know about
    #[serde(other)]
    Other,
}

/// Source position of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// One message emitted while elaborating a snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanMessage {
    pub severity: Severity,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    #[serde(default, alias = "endPos", skip_serializing_if = "Option::is_none")]
    pub end_pos: Option<Position>,
}

impl LeanMessage {
    /// Create a message without positions
    pub fn new(severity: Severity, data: impl Into<String>) -> Self {
        Self {
            severity,
            data: data.into(),
            pos: None,
            end_pos: None,
        }
    }

    /// Whether this is a warning about a remaining `sorry`
    pub fn is_sorry_warning(&self) -> bool {
        self.severity == Severity::Warning && self.data.contains(SORRY)
    }
}

/// A `sorry` the REPL reported, with its open goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorryInfo {
    pub goal: String,
    #[serde(default, alias = "proofState", skip_serializing_if = "Option::is_none")]
    pub proof_state: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// Canonical REPL payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanResponse {
    #[serde(default)]
    pub messages: Vec<LeanMessage>,
    #[serde(default)]
    pub sorries: Vec<SorryInfo>,
}

/// Normalised verification result for one submitted snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Id of the snippet this answers
    pub id: String,
    /// Transport or server-side failure for this snippet
    pub error: Option<String>,
    /// Messages and sorries reported by Lean
    pub response: LeanResponse,
}

impl CheckResult {
    /// Successful result with the given messages
    pub fn ok(id: impl Into<String>, messages: Vec<LeanMessage>) -> Self {
        Self {
            id: id.into(),
            error: None,
            response: LeanResponse {
                messages,
                sorries: Vec::new(),
            },
        }
    }

    /// Failed result carrying a transport error
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(error.into()),
            response: LeanResponse::default(),
        }
    }

    /// Attach reported sorries
    pub fn with_sorries(mut self, sorries: Vec<SorryInfo>) -> Self {
        self.response.sorries = sorries;
        self
    }

    /// Transport error or any error-severity message
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
            || self
                .response
                .messages
                .iter()
                .any(|m| m.severity == Severity::Error)
    }

    /// Whether a warning says a `sorry` is still present
    pub fn uses_sorry(&self) -> bool {
        self.response.messages.iter().any(LeanMessage::is_sorry_warning)
    }

    /// Whether the snippet counts as a checked proof
    pub fn is_verified(&self, accept_sorry: bool) -> bool {
        !self.has_errors() && (accept_sorry || !self.uses_sorry())
    }

    /// Proof suggested by a `... ?` tactic, if any
    ///
    /// With `reject_sorry`, suggestions that still contain `sorry` are
    /// ignored.
    pub fn suggested_proof(&self, reject_sorry: bool) -> Option<String> {
        self.response.messages.iter().find_map(|m| {
            if m.severity != Severity::Info {
                return None;
            }
            let rest = m.data.strip_prefix(SUGGESTION_MARKER)?;
            if reject_sorry && m.data.contains(SORRY) {
                return None;
            }
            Some(rest.trim().to_string())
        })
    }

    /// Goal of the first reported `sorry`
    pub fn first_goal(&self) -> Option<&str> {
        self.response.sorries.first().map(|s| s.goal.as_str())
    }

    /// Human-readable error lines
    pub fn diagnostics(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.error.iter().cloned().collect();
        lines.extend(
            self.response
                .messages
                .iter()
                .filter(|m| m.severity == Severity::Error)
                .map(|m| match m.pos {
                    Some(pos) => format!("{}:{}: {}", pos.line, pos.column, m.data),
                    None => m.data.clone(),
                }),
        );
        lines
    }
}

/// Either wire shape of a `/check` reply
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCheckResponse {
    /// `{ "results": [...] }`
    Structured { results: Vec<RawCheckItem> },
    /// `[...]`
    Legacy(Vec<RawCheckItem>),
}

/// One item of a raw reply
#[derive(Debug, Clone, Deserialize)]
pub struct RawCheckItem {
    #[serde(default, alias = "custom_id")]
    pub id: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response: Option<RawPayload>,
}

/// Per-item payload: REPL output or an error object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    /// `{ "message": "..." }` reported instead of REPL output
    Failure { message: String },
    /// Regular REPL output
    Repl(LeanResponse),
}

impl RawCheckResponse {
    /// Normalise to the flat result shape
    pub fn normalize(self) -> Vec<CheckResult> {
        let items = match self {
            Self::Structured { results } | Self::Legacy(results) => results,
        };
        items.into_iter().map(RawCheckItem::normalize).collect()
    }
}

impl RawCheckItem {
    fn normalize(self) -> CheckResult {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        let (error, response) = match self.response {
            Some(RawPayload::Repl(response)) => (self.error, response),
            Some(RawPayload::Failure { message }) => {
                (self.error.or(Some(message)), LeanResponse::default())
            }
            None => (self.error, LeanResponse::default()),
        };
        CheckResult {
            id,
            error,
            response,
        }
    }
}
