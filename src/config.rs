use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

// ─────────────────────────────────────────────
// Harness configuration
// ─────────────────────────────────────────────

/// Locations of the fixture blobs consumed by a run.
#[derive(Debug, Clone)]
pub struct FixturePaths {
    pub witness: PathBuf,
    pub pis: PathBuf,
    /// Baseline proof, compared by length only. Optional at runtime.
    pub reference_proof: Option<PathBuf>,
}

impl Default for FixturePaths {
    fn default() -> Self {
        Self {
            witness: PathBuf::from("example_witness.bin"),
            pis: PathBuf::from("example_pis.bin"),
            reference_proof: Some(PathBuf::from("example_proof.bin")),
        }
    }
}

/// Everything a [`crate::driver::Driver`] needs for one run against one service.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base URL of the service under test, without trailing slash.
    pub base_url: String,
    pub fixtures: FixturePaths,
    /// Per-request timeout. Expiry counts as a transport failure.
    pub request_timeout: Duration,
    /// Wait for `GET /ready` before the first scenario, if set.
    pub ready_timeout: Option<Duration>,
    /// Pin the tamper byte/bit selection.
    pub tamper_seed: Option<u64>,
    /// How many times the valid proof is verified.
    pub verify_repeat: u32,
    /// Where to write the proof returned by the service.
    pub proof_out: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3030".to_string(),
            fixtures: FixturePaths::default(),
            request_timeout: Duration::from_secs(10),
            ready_timeout: None,
            tamper_seed: None,
            verify_repeat: 1,
            proof_out: None,
        }
    }
}

impl HarnessConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

// ─────────────────────────────────────────────
// Command line
// ─────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "proof-conformance")]
#[command(about = "Conformance tests for an HTTP prove/verify service")]
pub struct Args {
    /// Base URL of the service under test
    #[arg(long, default_value = "http://127.0.0.1:3030")]
    pub base_url: String,

    /// Witness fixture
    #[arg(long, default_value = "example_witness.bin")]
    pub witness: PathBuf,

    /// Public inputs fixture
    #[arg(long, default_value = "example_pis.bin")]
    pub pis: PathBuf,

    /// Reference proof, compared by length (skipped when unreadable)
    #[arg(long, default_value = "example_proof.bin")]
    pub reference_proof: PathBuf,

    /// Write the proof returned by the service to this file
    #[arg(long)]
    pub proof_out: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Wait up to this many seconds for GET /ready before testing
    #[arg(long)]
    pub ready_timeout_secs: Option<u64>,

    /// Seed for the tamper bit selection
    #[arg(long)]
    pub tamper_seed: Option<u64>,

    /// Verify the valid proof this many times
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub verify_repeat: u32,

    /// Spawn this service binary as `<bin> 127.0.0.1 <port>` and test it
    #[arg(long)]
    pub service_bin: Option<PathBuf>,

    /// Treat service robustness defects as failures
    #[arg(long)]
    pub strict: bool,
}

impl Args {
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            fixtures: FixturePaths {
                witness: self.witness.clone(),
                pis: self.pis.clone(),
                reference_proof: Some(self.reference_proof.clone()),
            },
            request_timeout: Duration::from_secs(self.timeout_secs),
            ready_timeout: self.ready_timeout_secs.map(Duration::from_secs),
            tamper_seed: self.tamper_seed,
            verify_repeat: self.verify_repeat,
            proof_out: self.proof_out.clone(),
            ..HarnessConfig::default()
        }
        .with_base_url(self.base_url.as_str())
    }
}
