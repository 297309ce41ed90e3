//! Verifier entry point.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use verifier::VerifierConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = VerifierConfig::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Run both checks
    tracing::info!(?config, "starting verification");
    let report = match verifier::run(&config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "verification aborted");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        appends = report.consistency.appends.appends,
        failed_appends = report.consistency.appends.failed,
        checked = report.consistency.checked,
        violations = report.consistency.violations.len(),
        "consistency check finished"
    );
    tracing::info!(
        appends = report.monotonic.appends.appends,
        batches = report.monotonic.batches,
        compared = report.monotonic.compared,
        violations = report.monotonic.violations.len(),
        "monotonic check finished"
    );
    tracing::info!(metrics = %metrics_handle.render(), "run metrics");

    if report.passed() {
        ExitCode::SUCCESS
    } else {
        tracing::error!("verification failed");
        ExitCode::FAILURE
    }
}
