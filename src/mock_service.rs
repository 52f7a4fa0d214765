//! In-process proving service used by the tests.
//!
//! The "proof" is a toy construction: for a witness `w` of [`WITNESS_LEN`]
//! bytes, the public inputs are `w[..PIS_LEN]` and the proof is
//! `body || sha256(pis || body)` with `body = sha512(w) || sha256(w)`.
//! Any single flipped bit breaks the tag, which is all the tamper scenario
//! needs.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256, Sha512};
use tokio::task::JoinHandle;

use crate::frame;

pub const WITNESS_LEN: usize = 512;
pub const PIS_LEN: usize = 64;
pub const PROOF_LEN: usize = 128;

/// How the mock reacts to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Honors the contract.
    Conformant,
    /// Panics on bad witnesses and bad proofs, dropping the connection.
    Crashing,
    /// Accepts any witness and answers "success" to every verify.
    Lenient,
    /// /prove always answers 500.
    BrokenProver,
    /// /verify answers with text outside the contract.
    Garbled,
    /// Sleeps before every answer, /ready included.
    Slow(Duration),
    /// Conformant, but every 400 carries `Connection: close`.
    Closing,
}

#[derive(Debug, Default)]
struct Counters {
    prove_calls: usize,
    verify_calls: usize,
    last_verify_frame_len: Option<usize>,
    last_content_length: Option<u64>,
}

/// Shared state passed to all mock handlers.
pub struct MockState {
    behavior: MockBehavior,
    counters: Mutex<Counters>,
}

// ─────────────────────────────────────────────
// Toy proof system
// ─────────────────────────────────────────────

fn proof_body(witness: &[u8]) -> Vec<u8> {
    let mut body = Sha512::digest(witness).to_vec();
    body.extend_from_slice(&Sha256::digest(witness));
    body
}

fn proof_tag(pis: &[u8], body: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(pis);
    hasher.update(body);
    hasher.finalize().to_vec()
}

fn make_proof(witness: &[u8]) -> Vec<u8> {
    let body = proof_body(witness);
    let mut proof = body.clone();
    proof.extend_from_slice(&proof_tag(&witness[..PIS_LEN.min(witness.len())], &body));
    proof
}

fn check_proof(pis: &[u8], proof: &[u8]) -> bool {
    if pis.len() != PIS_LEN || proof.len() != PROOF_LEN {
        return false;
    }
    let (body, tag) = proof.split_at(PROOF_LEN - 32);
    proof_tag(pis, body) == tag
}

fn is_octet_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        == Some("application/octet-stream")
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// 415 for a wrong content type, 411 for a missing or wrong length.
fn check_headers(state: &MockState, headers: &HeaderMap, body: &[u8]) -> Option<StatusCode> {
    let declared = declared_length(headers);
    if let Ok(mut counters) = state.counters.lock() {
        counters.last_content_length = declared;
    }
    if !is_octet_stream(headers) {
        return Some(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
    if declared != Some(body.len() as u64) {
        return Some(StatusCode::LENGTH_REQUIRED);
    }
    None
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

/// POST /prove: witness in, proof out.
async fn prove_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Ok(mut counters) = state.counters.lock() {
        counters.prove_calls += 1;
    }
    if let MockBehavior::Slow(delay) = state.behavior {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = check_headers(&state, &headers, &body) {
        return status.into_response();
    }

    match state.behavior {
        MockBehavior::BrokenProver => {
            (StatusCode::INTERNAL_SERVER_ERROR, b"boom".to_vec()).into_response()
        }
        MockBehavior::Lenient => (StatusCode::OK, make_proof(&body)).into_response(),
        MockBehavior::Crashing if body.len() != WITNESS_LEN => {
            panic!("witness length {} != {}", body.len(), WITNESS_LEN)
        }
        MockBehavior::Closing if body.len() != WITNESS_LEN => (
            StatusCode::BAD_REQUEST,
            [(header::CONNECTION, "close")],
            "bad witness length",
        )
            .into_response(),
        _ if body.len() != WITNESS_LEN => StatusCode::BAD_REQUEST.into_response(),
        _ => (StatusCode::OK, make_proof(&body)).into_response(),
    }
}

/// POST /verify: framed pis and proof in, "success"/"failure" out.
async fn verify_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Ok(mut counters) = state.counters.lock() {
        counters.verify_calls += 1;
        counters.last_verify_frame_len = Some(body.len());
    }
    if let MockBehavior::Slow(delay) = state.behavior {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = check_headers(&state, &headers, &body) {
        return (status, String::new());
    }

    let (pis, proof) = match frame::decode(&body) {
        Ok(parts) => parts,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };
    let valid = check_proof(pis, proof);

    match state.behavior {
        MockBehavior::Lenient => (StatusCode::OK, "success".to_string()),
        MockBehavior::Garbled => (StatusCode::OK, "Verified!".to_string()),
        MockBehavior::Crashing if !valid => panic!("proof rejected by verifier"),
        _ if valid => (StatusCode::OK, "success".to_string()),
        _ => (StatusCode::OK, "failure".to_string()),
    }
}

/// GET /ready
async fn ready_handler(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    if let MockBehavior::Slow(delay) = state.behavior {
        tokio::time::sleep(delay).await;
    }
    (StatusCode::OK, "Ready")
}

pub fn build_router(state: Arc<MockState>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/prove", post(prove_handler))
        .route("/verify", post(verify_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

// ─────────────────────────────────────────────
// Running instance
// ─────────────────────────────────────────────

/// A mock service listening on an ephemeral localhost port. Stops on drop.
pub struct MockService {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockService {
    pub async fn start(behavior: MockBehavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            counters: Mutex::new(Counters::default()),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock service");
        let addr = listener.local_addr().expect("mock service address");
        let app = build_router(state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Self { addr, state, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A valid witness for any mock service.
    pub fn witness() -> Vec<u8> {
        (0..WITNESS_LEN).map(|i| (i * 7 + 3) as u8).collect()
    }

    pub fn pis_of(witness: &[u8]) -> Vec<u8> {
        witness[..PIS_LEN].to_vec()
    }

    pub fn prove_calls(&self) -> usize {
        self.state.counters.lock().map(|c| c.prove_calls).unwrap_or(0)
    }

    pub fn verify_calls(&self) -> usize {
        self.state.counters.lock().map(|c| c.verify_calls).unwrap_or(0)
    }

    pub fn last_verify_frame_len(&self) -> Option<usize> {
        self.state
            .counters
            .lock()
            .ok()
            .and_then(|c| c.last_verify_frame_len)
    }

    /// `Content-Length` declared by the latest /prove or /verify request.
    pub fn last_content_length(&self) -> Option<u64> {
        self.state
            .counters
            .lock()
            .ok()
            .and_then(|c| c.last_content_length)
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_test::{TestResponse, TestServer};

    fn create_test_app(behavior: MockBehavior) -> TestServer {
        let state = Arc::new(MockState {
            behavior,
            counters: Mutex::new(Counters::default()),
        });
        TestServer::new(build_router(state)).unwrap()
    }

    /// POST with an octet-stream body and an explicit `Content-Length`.
    async fn post_octets(server: &TestServer, path: &str, body: Vec<u8>) -> TestResponse {
        server
            .post(path)
            .content_type("application/octet-stream")
            .add_header(header::CONTENT_LENGTH, HeaderValue::from(body.len()))
            .bytes(Bytes::from(body))
            .await
    }

    #[test]
    fn test_toy_proof_checks() {
        let w = MockService::witness();
        let proof = make_proof(&w);
        assert_eq!(proof.len(), PROOF_LEN);
        assert!(check_proof(&w[..PIS_LEN], &proof));

        let mut tampered = proof.clone();
        tampered[10] ^= 1 << 3;
        assert!(!check_proof(&w[..PIS_LEN], &tampered));
    }

    fn octet_headers(len: Option<usize>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        if let Some(len) = len {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        headers
    }

    #[test]
    fn test_header_checks() {
        let state = MockState {
            behavior: MockBehavior::Conformant,
            counters: Mutex::new(Counters::default()),
        };
        let body = [0u8; 5];

        assert_eq!(check_headers(&state, &octet_headers(Some(5)), &body), None);
        assert_eq!(
            check_headers(&state, &octet_headers(None), &body),
            Some(StatusCode::LENGTH_REQUIRED)
        );
        assert_eq!(
            check_headers(&state, &octet_headers(Some(4)), &body),
            Some(StatusCode::LENGTH_REQUIRED)
        );

        let mut text = octet_headers(Some(5));
        text.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(
            check_headers(&state, &text, &body),
            Some(StatusCode::UNSUPPORTED_MEDIA_TYPE)
        );
    }

    #[tokio::test]
    async fn test_prove_valid_witness_returns_proof() {
        let server = create_test_app(MockBehavior::Conformant);
        let response = post_octets(&server, "/prove", MockService::witness()).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().len(), PROOF_LEN);
    }

    #[tokio::test]
    async fn test_prove_short_witness_returns_400() {
        let server = create_test_app(MockBehavior::Conformant);
        let mut short = MockService::witness();
        short.pop();
        let response = post_octets(&server, "/prove", short).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_closing_400_carries_connection_close() {
        let server = create_test_app(MockBehavior::Closing);
        let mut short = MockService::witness();
        short.pop();
        let response = post_octets(&server, "/prove", short).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.header(header::CONNECTION), "close");
    }

    #[tokio::test]
    async fn test_prove_wrong_content_type_returns_415() {
        let server = create_test_app(MockBehavior::Conformant);
        let body = MockService::witness();
        let response = server
            .post("/prove")
            .content_type("text/plain")
            .add_header(header::CONTENT_LENGTH, HeaderValue::from(body.len()))
            .bytes(Bytes::from(body))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_verify_malformed_frame_returns_400() {
        let server = create_test_app(MockBehavior::Conformant);
        let response = post_octets(&server, "/verify", vec![1, 2, 3]).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_tampered_proof_returns_failure() {
        let server = create_test_app(MockBehavior::Conformant);
        let w = MockService::witness();
        let mut proof = make_proof(&w);
        proof[0] ^= 1;
        let response = post_octets(&server, "/verify", frame::encode(&w[..PIS_LEN], &proof)).await;
        response.assert_status_ok();
        response.assert_text("failure");
    }

    #[tokio::test]
    async fn test_ready_returns_200() {
        let server = create_test_app(MockBehavior::Conformant);
        server.get("/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_get_on_post_route_returns_405() {
        let server = create_test_app(MockBehavior::Conformant);
        let response = server.get("/prove").await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
