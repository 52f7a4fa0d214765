mod client;
mod config;
mod driver;
mod error;
mod fixtures;
mod frame;
mod launcher;
#[cfg(test)]
mod mock_service;
mod report;
mod tamper;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use crate::config::{Args, HarnessConfig};
use crate::driver::Driver;
use crate::error::HarnessError;
use crate::launcher::ServiceProcess;
use crate::report::RunReport;

/// Readiness deadline when we started the service ourselves.
const SPAWNED_READY_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proof_conformance=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = args.harness_config();

    // Start the service under test if a binary was given
    let service = match &args.service_bin {
        Some(bin) => match ServiceProcess::spawn(bin) {
            Ok(service) => {
                tracing::info!("Service under test spawned on port {}", service.port());
                config = config.with_base_url(service.base_url());
                config.ready_timeout.get_or_insert(SPAWNED_READY_TIMEOUT);
                Some(service)
            }
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    tracing::info!(
        "Running conformance scenarios against {} (timeout {:?})",
        config.base_url,
        config.request_timeout
    );

    let outcome = run(config).await;

    if let Some(service) = service {
        service.stop().await;
    }

    match outcome {
        Ok(report) => {
            println!("{}", report);
            if let Some(path) = &args.report {
                match report.write_json(path) {
                    Ok(()) => tracing::info!("Report written to {}", path.display()),
                    Err(e) => tracing::warn!("Failed to write report to {}: {}", path.display(), e),
                }
            }
            if report.is_success(args.strict) {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!("Conformance run aborted: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(config: HarnessConfig) -> Result<RunReport, HarnessError> {
    Driver::new(config)?.run().await
}
