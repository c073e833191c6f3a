pub mod capacity;
pub mod config;
pub mod credentials;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod readiness;
pub mod registry;
pub mod report;

pub use capacity::{
    ClusterNameStrategy, ExpectedCapacityMap, InfrastructureResource, NodeGroupTemplate,
    WorkerTagStrategy, extract, extract_with, load_resources,
};
pub use config::SmokeConfig;
pub use credentials::{ClusterCredential, ClusterHandle, resolve};
pub use error::{Error, Result};
pub use hooks::KubeconfigScript;
pub use orchestrator::SmokeTest;
pub use readiness::{
    ClusterApi, ConfigMapTarget, EndpointCheck, KubeClusterApi, ReadinessEngine, RetryPolicy,
};
pub use registry::ClusterRegistry;
pub use report::{
    CheckFailure, CheckKind, ClusterReport, EndpointReport, ReadinessReport, SmokeReport,
};

/// Run the smoke test end to end.
///
/// Builds the cluster registry from `credentials`, derives each cluster's
/// expected worker count from `resources`, and runs the readiness checklist
/// against every cluster, then checks the configured HTTP endpoints.
/// Malformed credentials or templates fail the call; check failures are
/// collected in the returned report.
pub async fn run_smoke_test(
    credentials: &[ClusterCredential],
    resources: &[InfrastructureResource],
    config: &SmokeConfig,
) -> Result<SmokeReport> {
    let registry = ClusterRegistry::build(credentials).await?;
    tracing::info!(clusters = registry.len(), "Built cluster registry");

    let expected = extract(resources)?;
    for (cluster, count) in expected.iter() {
        tracing::info!(cluster = %cluster, desired_nodes = count, "Expected worker capacity");
    }

    let engine = ReadinessEngine::new(config.retry.clone(), config.config_map.clone());
    let smoke = SmokeTest::new(engine).with_endpoints(config.endpoint_checks());
    let report = smoke.run(&registry, &expected).await;

    if smoke.endpoints().is_empty() {
        return Ok(report);
    }
    let fetch = readiness::ReqwestFetch::new(readiness::endpoint::DEFAULT_REQUEST_TIMEOUT)?;
    Ok(report.with_endpoints(smoke.run_endpoints(&fetch).await))
}

/// Install the rustls crypto provider used by the kube client
///
/// Safe to call more than once; an already installed provider is kept.
pub fn install_crypto_provider() -> Result<()> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err(Error::ConfigError(
            "failed to install rustls crypto provider and no provider is available".to_string(),
        ));
    }
    Ok(())
}
