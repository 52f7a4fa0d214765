use std::path::Path;

use crate::config::FixturePaths;
use crate::error::HarnessError;

/// Fixture blobs for one run. Read-only after loading.
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub witness: Vec<u8>,
    pub pis: Vec<u8>,
    pub reference_proof: Option<Vec<u8>>,
}

fn read_required(name: &'static str, path: &Path) -> Result<Vec<u8>, HarnessError> {
    std::fs::read(path).map_err(|source| HarnessError::FixtureMissing {
        name,
        path: path.to_path_buf(),
        source,
    })
}

impl Fixtures {
    /// Load witness and public inputs, plus the reference proof if present.
    ///
    /// A missing witness or public-inputs file fails the whole load. The
    /// reference proof only produces a warning.
    pub fn load(paths: &FixturePaths) -> Result<Self, HarnessError> {
        let witness = read_required("witness", &paths.witness)?;
        let pis = read_required("public inputs", &paths.pis)?;

        let reference_proof = match &paths.reference_proof {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(
                        "Reference proof not loaded from {}: {}, continuing without it",
                        path.display(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            "Fixtures loaded: witness={} bytes, pis={} bytes, reference_proof={}",
            witness.len(),
            pis.len(),
            reference_proof
                .as_ref()
                .map(|p| format!("{} bytes", p.len()))
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(Self {
            witness,
            pis,
            reference_proof,
        })
    }
}
