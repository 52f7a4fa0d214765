use std::time::{Duration, Instant};

use crate::client::{render_body, CallOutcome, ServiceClient, VerifyOutcome};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, ScenarioError};
use crate::fixtures::Fixtures;
use crate::report::{
    RunReport, ScenarioReport, Verdict, PROVE_TRUNCATED, PROVE_VALID, VERIFY_TAMPERED,
    VERIFY_VALID,
};
use crate::tamper::{self, BitFlip};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the conformance scenarios against one service.
///
/// Order is fixed: prove, verify (valid), verify (tampered), prove
/// (truncated witness). Both verify scenarios need the proof from the first
/// prove and are reported as blocked without it.
pub struct Driver {
    config: HarnessConfig,
    client: ServiceClient,
}

impl Driver {
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        let client = ServiceClient::new(&config.base_url, config.request_timeout)?;
        Ok(Self { config, client })
    }

    /// Load fixtures, optionally wait for readiness, then run every scenario.
    ///
    /// Only run-level problems are errors; scenario failures land in the report.
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        let fixtures = Fixtures::load(&self.config.fixtures)?;
        if let Some(deadline) = self.config.ready_timeout {
            self.wait_ready(deadline).await?;
        }
        Ok(self.run_with(&fixtures).await)
    }

    /// Poll `GET /ready` until it answers 2xx or `deadline` passes.
    pub async fn wait_ready(&self, deadline: Duration) -> Result<(), HarnessError> {
        let start = Instant::now();
        tracing::info!(
            "Waiting up to {:?} for {} to become ready",
            deadline,
            self.client.base_url()
        );
        loop {
            // A /ready that accepts but never answers must not outlast the deadline.
            let remaining = deadline.saturating_sub(start.elapsed());
            let ready = tokio::time::timeout(remaining, self.client.ready())
                .await
                .unwrap_or(false);
            if ready {
                tracing::info!("Service ready after {:?}", start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= deadline {
                return Err(HarnessError::ServiceNotReady {
                    base_url: self.client.base_url().to_string(),
                    waited: start.elapsed(),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    pub async fn run_with(&self, fixtures: &Fixtures) -> RunReport {
        let mut report = RunReport::new(self.client.base_url());

        let (prove_report, proof) = self.prove_valid(fixtures).await;
        report.push(prove_report);

        match proof {
            Some(proof) => {
                report.push(self.verify_valid(&fixtures.pis, &proof).await);
                let flip = BitFlip::choose(&mut tamper::rng(self.config.tamper_seed), proof.len());
                report.push(self.verify_tampered(&fixtures.pis, &proof, flip).await);
            }
            None => {
                report.push(ScenarioReport::blocked(VERIFY_VALID, PROVE_VALID));
                report.push(ScenarioReport::blocked(VERIFY_TAMPERED, PROVE_VALID));
            }
        }

        report.push(self.prove_truncated(&fixtures.witness).await);
        report
    }

    // ─────────────────────────────────────────────
    // Scenarios
    // ─────────────────────────────────────────────

    async fn prove_valid(&self, fixtures: &Fixtures) -> (ScenarioReport, Option<Vec<u8>>) {
        let start = Instant::now();
        match self.expect_proof(&fixtures.witness).await {
            Ok(proof) => {
                tracing::info!(
                    "Proof generated: {} bytes (starts 0x{})",
                    proof.len(),
                    hex::encode(&proof[..proof.len().min(8)])
                );
                if let Some(reference) = &fixtures.reference_proof {
                    if reference.len() == proof.len() {
                        tracing::info!("Proof length matches reference proof");
                    } else {
                        tracing::warn!(
                            "Proof is {} bytes, reference proof is {} bytes",
                            proof.len(),
                            reference.len()
                        );
                    }
                }
                self.persist_proof(&proof);
                let report = ScenarioReport::new(PROVE_VALID, Verdict::Passed, start.elapsed());
                (report, Some(proof))
            }
            Err(e) => {
                let report =
                    ScenarioReport::new(PROVE_VALID, Verdict::Failed(e.to_string()), start.elapsed());
                (report, None)
            }
        }
    }

    async fn verify_valid(&self, pis: &[u8], proof: &[u8]) -> ScenarioReport {
        let start = Instant::now();
        let verdict = match self.expect_verified(pis, proof).await {
            Ok(()) => Verdict::Passed,
            Err(e) => Verdict::Failed(e.to_string()),
        };
        ScenarioReport::new(VERIFY_VALID, verdict, start.elapsed())
    }

    /// Verify a copy of `proof` with one bit inverted. The service must
    /// answer "failure" as ordinary content.
    pub async fn verify_tampered(
        &self,
        pis: &[u8],
        proof: &[u8],
        flip: Option<BitFlip>,
    ) -> ScenarioReport {
        let start = Instant::now();
        let Some(flip) = flip else {
            return ScenarioReport::new(
                VERIFY_TAMPERED,
                Verdict::Skipped("proof is empty, nothing to tamper".to_string()),
                start.elapsed(),
            );
        };
        tracing::info!(
            "Tampering proof: byte {} bit {}",
            flip.byte_index,
            flip.bit_index
        );
        let tampered = flip.apply(proof);

        let verdict = match self.client.verify(pis, &tampered).await {
            CallOutcome::Transport(failure) => {
                tracing::warn!(
                    "Service robustness defect: tampered proof dropped the connection ({})",
                    failure
                );
                Verdict::DetectedWithCaveats(format!(
                    "tampered proof caught, but /verify failed at transport level ({}) instead of answering \"failure\"",
                    failure
                ))
            }
            CallOutcome::Response(response) => match VerifyOutcome::classify(&response) {
                Ok(VerifyOutcome::Failure) => Verdict::Passed,
                Ok(VerifyOutcome::Success) => Verdict::Failed(
                    ScenarioError::AssertionFailure {
                        expected: "\"failure\"".to_string(),
                        actual: "\"success\"".to_string(),
                    }
                    .to_string(),
                ),
                Err(e) => Verdict::Failed(e.to_string()),
            },
        };
        ScenarioReport::new(VERIFY_TAMPERED, verdict, start.elapsed()).with_bit_flip(Some(flip))
    }

    /// Prove with the witness one byte short. The service must answer 400.
    pub async fn prove_truncated(&self, witness: &[u8]) -> ScenarioReport {
        let start = Instant::now();
        if witness.is_empty() {
            return ScenarioReport::new(
                PROVE_TRUNCATED,
                Verdict::Skipped("witness is empty, nothing to truncate".to_string()),
                start.elapsed(),
            );
        }
        let truncated = &witness[..witness.len() - 1];

        let verdict = match self.client.prove(truncated).await {
            CallOutcome::Transport(failure) => {
                tracing::warn!(
                    "Service robustness defect: truncated witness dropped the connection ({})",
                    failure
                );
                Verdict::DetectedWithCaveats(format!(
                    "truncated witness caught, but /prove failed at transport level ({}) instead of answering 400",
                    failure
                ))
            }
            CallOutcome::Response(response) if response.status.as_u16() == 400 => {
                tracing::debug!("Truncated witness rejected: {}", response.render_body());
                if response.closes_connection {
                    tracing::warn!("/prove answered 400 but closed the connection");
                }
                Verdict::Passed
            }
            CallOutcome::Response(response) if response.status.is_success() => Verdict::Failed(
                ScenarioError::AssertionFailure {
                    expected: "status 400".to_string(),
                    actual: format!(
                        "status {} with a {} byte proof",
                        response.status.as_u16(),
                        response.body.len()
                    ),
                }
                .to_string(),
            ),
            CallOutcome::Response(response) => Verdict::Failed(
                ScenarioError::ProtocolViolation {
                    endpoint: "/prove",
                    status: response.status.as_u16(),
                    body: response.render_body(),
                    detail: "expected 400 for a truncated witness".to_string(),
                }
                .to_string(),
            ),
        };
        ScenarioReport::new(PROVE_TRUNCATED, verdict, start.elapsed())
    }

    // ─────────────────────────────────────────────
    // Expectations
    // ─────────────────────────────────────────────

    async fn expect_proof(&self, witness: &[u8]) -> Result<Vec<u8>, ScenarioError> {
        let response = match self.client.prove(witness).await {
            CallOutcome::Response(response) => response,
            CallOutcome::Transport(failure) => {
                return Err(ScenarioError::Transport {
                    endpoint: "/prove",
                    cause: failure.to_string(),
                })
            }
        };

        let status = response.status;
        if status.is_client_error() {
            return Err(ScenarioError::AssertionFailure {
                expected: "2xx with proof bytes".to_string(),
                actual: format!("status {} with body {}", status.as_u16(), response.render_body()),
            });
        }
        if !status.is_success() {
            return Err(ScenarioError::ProtocolViolation {
                endpoint: "/prove",
                status: status.as_u16(),
                body: response.render_body(),
                detail: "valid witness not proven".to_string(),
            });
        }
        if response.body.is_empty() {
            return Err(ScenarioError::ProtocolViolation {
                endpoint: "/prove",
                status: status.as_u16(),
                body: render_body(&response.body),
                detail: "empty proof".to_string(),
            });
        }
        Ok(response.body)
    }

    /// Verify `verify_repeat` times; every answer must be "success".
    async fn expect_verified(&self, pis: &[u8], proof: &[u8]) -> Result<(), ScenarioError> {
        let repeat = self.config.verify_repeat.max(1);
        for attempt in 1..=repeat {
            let response = match self.client.verify(pis, proof).await {
                CallOutcome::Response(response) => response,
                CallOutcome::Transport(failure) => {
                    return Err(ScenarioError::Transport {
                        endpoint: "/verify",
                        cause: failure.to_string(),
                    })
                }
            };
            if VerifyOutcome::classify(&response)? == VerifyOutcome::Failure {
                let actual = if repeat > 1 {
                    format!("\"failure\" on attempt {}/{}", attempt, repeat)
                } else {
                    "\"failure\"".to_string()
                };
                return Err(ScenarioError::AssertionFailure {
                    expected: "\"success\"".to_string(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn persist_proof(&self, proof: &[u8]) {
        let Some(path) = &self.config.proof_out else {
            return;
        };
        match std::fs::write(path, proof) {
            Ok(()) => tracing::info!("Proof written to {}", path.display()),
            Err(e) => tracing::warn!("Failed to write proof to {}: {}", path.display(), e),
        }
    }
}
