//! Runs the readiness checklist across every cluster under test
//!
//! Clusters are checked concurrently and independently: each future owns
//! its own client view and retry state, and the registry is only read.
//! One cluster failing never short-circuits the others. Endpoint checks
//! run the same way, after the clusters.

use futures::future::join_all;
use tracing::{Instrument, info, info_span};

use crate::capacity::ExpectedCapacityMap;
use crate::readiness::{ClusterApi, EndpointCheck, HttpFetch, ReadinessEngine};
use crate::registry::ClusterRegistry;
use crate::report::{EndpointReport, SmokeReport};

/// Smoke test orchestrator
#[derive(Clone, Debug, Default)]
pub struct SmokeTest {
    engine: ReadinessEngine,
    endpoints: Vec<EndpointCheck>,
}

impl SmokeTest {
    pub fn new(engine: ReadinessEngine) -> Self {
        Self {
            engine,
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<EndpointCheck>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn engine(&self) -> &ReadinessEngine {
        &self.engine
    }

    pub fn endpoints(&self) -> &[EndpointCheck] {
        &self.endpoints
    }

    /// Run the checklist against every cluster in the registry
    pub async fn run(
        &self,
        registry: &ClusterRegistry,
        expected: &ExpectedCapacityMap,
    ) -> SmokeReport {
        let clusters = registry.iter().map(|(name, handle)| (name, handle.api()));
        self.run_apis(clusters, expected).await
    }

    /// Run the checklist against arbitrary cluster views
    ///
    /// A cluster without an expectation is checked against zero nodes.
    pub async fn run_apis<'a, I, A>(
        &self,
        clusters: I,
        expected: &ExpectedCapacityMap,
    ) -> SmokeReport
    where
        I: IntoIterator<Item = (&'a str, A)>,
        A: ClusterApi,
    {
        let checks = clusters.into_iter().map(|(name, api)| {
            let desired = expected.get(name).unwrap_or(0);
            let span = info_span!("smoke", cluster = %name);
            async move { self.engine.run_checklist(name, &api, desired).await }.instrument(span)
        });

        let report = SmokeReport::new(join_all(checks).await);

        info!(
            clusters = report.clusters.len(),
            failures = report.failure_count(),
            passed = report.passed(),
            "Smoke test finished"
        );
        report
    }

    /// Run every endpoint check through `fetch`
    pub async fn run_endpoints<F>(&self, fetch: &F) -> Vec<EndpointReport>
    where
        F: HttpFetch + ?Sized,
    {
        let checks = self.endpoints.iter().map(|check| {
            let span = info_span!("endpoint", url = %check.url());
            async move { EndpointReport::new(check.url(), check.run(fetch).await) }.instrument(span)
        });

        let reports = join_all(checks).await;

        info!(
            endpoints = reports.len(),
            failed = reports.iter().filter(|r| !r.passed()).count(),
            "Endpoint checks finished"
        );
        reports
    }
}
