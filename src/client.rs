use std::fmt;
use std::time::Duration;

use reqwest::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::ScenarioError;
use crate::frame;

const OCTET_STREAM: &str = "application/octet-stream";

/// Bodies longer than this are cut short in messages.
const RENDER_LIMIT: usize = 64;

// ─────────────────────────────────────────────
// Call results
// ─────────────────────────────────────────────

/// A well-formed HTTP answer from the service.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// The service answered with `Connection: close`.
    pub closes_connection: bool,
}

impl Response {
    /// Render the body for a human: quoted text, or hex when not UTF-8.
    pub fn render_body(&self) -> String {
        render_body(&self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Could not open a connection.
    Connect,
    /// No complete answer within the request timeout.
    Timeout,
    /// Connection closed or reset before a complete answer.
    Dropped,
}

/// The service produced no well-formed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportKind,
    pub message: String,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl TransportFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Dropped
        };
        Self {
            kind,
            message: error_chain(&err),
        }
    }
}

/// Outcome of one request. Transport failures are data, not errors, so
/// scenarios can tell "service answered" from "service went away".
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Response(Response),
    Transport(TransportFailure),
}

/// Semantic verdict carried by a `/verify` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    Failure,
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Success => f.write_str("success"),
            VerifyOutcome::Failure => f.write_str("failure"),
        }
    }
}

impl VerifyOutcome {
    /// Classify a `/verify` answer. Only a 2xx with a body of exactly
    /// `success` or `failure` is inside the contract.
    pub fn classify(response: &Response) -> Result<Self, ScenarioError> {
        if !response.status.is_success() {
            return Err(ScenarioError::ProtocolViolation {
                endpoint: "/verify",
                status: response.status.as_u16(),
                body: response.render_body(),
                detail: "non-2xx status".to_string(),
            });
        }
        match response.body.as_slice() {
            b"success" => Ok(VerifyOutcome::Success),
            b"failure" => Ok(VerifyOutcome::Failure),
            _ => Err(ScenarioError::ProtocolViolation {
                endpoint: "/verify",
                status: response.status.as_u16(),
                body: response.render_body(),
                detail: "body is neither \"success\" nor \"failure\"".to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────

/// HTTP client for the service under test.
///
/// One `reqwest::Client` is shared by every call. The pool reconnects
/// silently, so a service closing its connection after an answer only shows
/// up through [`Response::closes_connection`].
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /prove with the witness as an opaque body.
    pub async fn prove(&self, witness: &[u8]) -> CallOutcome {
        tracing::debug!("POST /prove witness_len={}", witness.len());
        self.post_octets("/prove", witness.to_vec()).await
    }

    /// POST /verify with the framed public inputs and proof.
    pub async fn verify(&self, pis: &[u8], proof: &[u8]) -> CallOutcome {
        let body = frame::encode(pis, proof);
        debug_assert!(frame::decode(&body).is_ok());
        tracing::debug!(
            "POST /verify pis_len={} proof_len={} frame_len={}",
            pis.len(),
            proof.len(),
            body.len()
        );
        self.post_octets("/verify", body).await
    }

    /// GET /ready. Any 2xx counts as ready.
    pub async fn ready(&self) -> bool {
        match self.http.get(self.url("/ready")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Readiness probe failed: {}", e);
                false
            }
        }
    }

    async fn post_octets(&self, path: &str, body: Vec<u8>) -> CallOutcome {
        let len = body.len();
        let sent = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return CallOutcome::Transport(TransportFailure::from_reqwest(e)),
        };

        let status = response.status();
        let closes_connection = response
            .headers()
            .get(CONNECTION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("close"));
        match response.bytes().await {
            Ok(bytes) => {
                tracing::debug!("{} answered {} with {} bytes", path, status, bytes.len());
                CallOutcome::Response(Response {
                    status,
                    body: bytes.to_vec(),
                    closes_connection,
                })
            }
            Err(e) => CallOutcome::Transport(TransportFailure::from_reqwest(e)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Quoted UTF-8 text, or `0x`-prefixed hex, cut at [`RENDER_LIMIT`] bytes.
pub fn render_body(body: &[u8]) -> String {
    let shown = &body[..body.len().min(RENDER_LIMIT)];
    let suffix = if body.len() > RENDER_LIMIT {
        format!("... ({} bytes)", body.len())
    } else {
        String::new()
    };
    match std::str::from_utf8(shown) {
        Ok(text) => format!("{:?}{}", text, suffix),
        Err(_) => format!("0x{}{}", hex::encode(shown), suffix),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
