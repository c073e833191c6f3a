use std::process::ExitCode;

use tracing::{error, info, warn};

use cluster_smoke::{
    ClusterCredential, SmokeConfig, install_crypto_provider, load_resources, run_smoke_test,
};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any client is built
    install_crypto_provider()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cluster_smoke=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    let config = SmokeConfig::from_env()?;
    if config.kubeconfigs.is_empty() {
        error!(
            "No kubeconfigs given, set {}",
            cluster_smoke::config::ENV_KUBECONFIGS
        );
        return Ok(ExitCode::from(2));
    }

    info!(
        clusters = config.kubeconfigs.len(),
        endpoints = config.endpoints.len(),
        max_attempts = config.retry.max_attempts,
        interval_secs = config.retry.interval.as_secs(),
        "Starting cluster smoke test"
    );

    let credentials = config
        .kubeconfigs
        .iter()
        .map(|path| ClusterCredential::read_from(path))
        .collect::<Result<Vec<_>, _>>()?;

    let resources = match &config.stack_state {
        Some(path) => load_resources(&tokio::fs::read_to_string(path).await?)?,
        None => {
            warn!(
                "{} not set, no worker capacity will be expected",
                cluster_smoke::config::ENV_STACK_STATE
            );
            Vec::new()
        }
    };

    let report = run_smoke_test(&credentials, &resources, &config).await?;
    info!("Smoke test summary:\n{}", report);

    if report.passed() {
        info!("All checks passed");
        Ok(ExitCode::SUCCESS)
    } else {
        for (source, failure) in report.failures() {
            error!(source = %source, "{}", failure);
        }
        Ok(ExitCode::FAILURE)
    }
}
