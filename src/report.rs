use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::tamper::BitFlip;

/// Scenario names, in run order.
pub const PROVE_VALID: &str = "prove_valid_witness";
pub const VERIFY_VALID: &str = "verify_valid_proof";
pub const VERIFY_TAMPERED: &str = "verify_tampered_proof";
pub const PROVE_TRUNCATED: &str = "prove_truncated_witness";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed(String),
    /// The bad input was caught, but only because the service fell over
    /// instead of answering.
    DetectedWithCaveats(String),
    /// A scenario this one depends on did not produce its output.
    Blocked(String),
    /// Nothing to test with the given fixtures.
    Skipped(String),
}

impl Verdict {
    fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "PASS",
            Verdict::Failed(_) => "FAIL",
            Verdict::DetectedWithCaveats(_) => "CAVEAT",
            Verdict::Blocked(_) => "BLOCKED",
            Verdict::Skipped(_) => "SKIP",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Verdict::Passed => None,
            Verdict::Failed(d)
            | Verdict::DetectedWithCaveats(d)
            | Verdict::Blocked(d)
            | Verdict::Skipped(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub name: &'static str,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_flip: Option<BitFlip>,
}

impl ScenarioReport {
    pub fn new(name: &'static str, verdict: Verdict, elapsed: Duration) -> Self {
        Self {
            name,
            verdict,
            elapsed_ms: elapsed.as_millis() as u64,
            bit_flip: None,
        }
    }

    pub fn with_bit_flip(mut self, flip: Option<BitFlip>) -> Self {
        self.bit_flip = flip;
        self
    }

    /// A scenario that never ran because `dependency` produced nothing.
    pub fn blocked(name: &'static str, dependency: &str) -> Self {
        Self::new(
            name,
            Verdict::Blocked(format!("{} did not produce a proof", dependency)),
            Duration::ZERO,
        )
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>7}] {} ({} ms)",
            self.verdict.label(),
            self.name,
            self.elapsed_ms
        )?;
        if let Some(detail) = self.verdict.detail() {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub caveats: usize,
    pub blocked: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub base_url: String,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            scenarios: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ScenarioReport) {
        match &report.verdict {
            Verdict::Passed => tracing::info!("{}", report),
            Verdict::DetectedWithCaveats(_) | Verdict::Skipped(_) => tracing::warn!("{}", report),
            Verdict::Failed(_) | Verdict::Blocked(_) => tracing::error!("{}", report),
        }
        self.scenarios.push(report);
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for scenario in &self.scenarios {
            match scenario.verdict {
                Verdict::Passed => summary.passed += 1,
                Verdict::Failed(_) => summary.failed += 1,
                Verdict::DetectedWithCaveats(_) => summary.caveats += 1,
                Verdict::Blocked(_) => summary.blocked += 1,
                Verdict::Skipped(_) => summary.skipped += 1,
            }
        }
        summary
    }

    /// True when nothing failed or was blocked. With `strict`, caveats
    /// count as failures too.
    pub fn is_success(&self, strict: bool) -> bool {
        let summary = self.summary();
        summary.failed == 0 && summary.blocked == 0 && (!strict || summary.caveats == 0)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conformance run against {}", self.base_url)?;
        for scenario in &self.scenarios {
            writeln!(f, "  {}", scenario)?;
        }
        let s = self.summary();
        write!(
            f,
            "{} passed, {} failed, {} with caveats, {} blocked, {} skipped",
            s.passed, s.failed, s.caveats, s.blocked, s.skipped
        )
    }
}
