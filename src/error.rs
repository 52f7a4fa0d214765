use std::path::PathBuf;
use std::time::Duration;

/// Run-level failures. Any of these aborts the run before (or instead of)
/// the scenarios; nothing partial is reported.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("fixture {name} missing at {}: {source}", .path.display())]
    FixtureMissing {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to launch service {}: {source}", .bin.display())]
    ServiceLaunch {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("service at {base_url} not ready after {waited:?}")]
    ServiceNotReady { base_url: String, waited: Duration },
}

/// Why a single scenario failed. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    /// Status/body combination outside the documented contract.
    #[error("protocol violation on {endpoint}: {detail} (status {status}, body {body})")]
    ProtocolViolation {
        endpoint: &'static str,
        status: u16,
        body: String,
        detail: String,
    },

    /// A well-formed answer that contradicts the expected outcome.
    #[error("expected {expected}, got {actual}")]
    AssertionFailure { expected: String, actual: String },

    /// The service could not be reached for a call that should have succeeded.
    #[error("transport failure on {endpoint}: {cause}")]
    Transport { endpoint: &'static str, cause: String },
}

/// Errors raised while decoding a verifier input frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short for length prefixes: {0} bytes")]
    MissingPrefix(usize),

    #[error("segment lengths overflow: pis={pis_len} proof={proof_len}")]
    LengthOverflow { pis_len: u64, proof_len: u64 },

    #[error("frame body is {actual} bytes, prefixes declare {declared}")]
    LengthMismatch { declared: u64, actual: usize },
}
