use std::path::{Path, PathBuf};
use std::process::Stdio;

use rand::Rng;
use tokio::process::{Child, Command};

use crate::error::HarnessError;

const HOST: &str = "127.0.0.1";

/// A service binary started for the duration of a run.
///
/// The binary is invoked as `<bin> <host> <port>`. The child is killed when
/// this handle is dropped, including on early aborts.
pub struct ServiceProcess {
    child: Child,
    bin: PathBuf,
    port: u16,
}

impl ServiceProcess {
    /// Spawn `bin` on a random port in `[20000, 30000)`.
    pub fn spawn(bin: &Path) -> Result<Self, HarnessError> {
        let port = rand::thread_rng().gen_range(20000..30000);
        Self::spawn_on(bin, port)
    }

    pub fn spawn_on(bin: &Path, port: u16) -> Result<Self, HarnessError> {
        tracing::info!("Starting service {} on {}:{}", bin.display(), HOST, port);
        let child = Command::new(bin)
            .arg(HOST)
            .arg(port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HarnessError::ServiceLaunch {
                bin: bin.to_path_buf(),
                source,
            })?;
        Ok(Self {
            child,
            bin: bin.to_path_buf(),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", HOST, self.port)
    }

    /// Kill the child and wait for it to exit.
    pub async fn stop(mut self) {
        match self.child.kill().await {
            Ok(()) => tracing::info!("Stopped service {}", self.bin.display()),
            Err(e) => tracing::warn!("Failed to stop service {}: {}", self.bin.display(), e),
        }
    }
}
