//! Smoke test results
//!
//! Check failures are collected, never raised mid-run, so every check on
//! every cluster gets evaluated. [`SmokeReport::assert_passed`] turns the
//! collected failures into a single test failure at the end.

use std::fmt;

use crate::error::{Error, Result};

/// The checks making up a cluster's checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    ApiServer,
    ConfigMap,
    Nodes,
    Pods,
    Endpoint,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::ApiServer => write!(f, "api-server"),
            CheckKind::ConfigMap => write!(f, "configmap"),
            CheckKind::Nodes => write!(f, "nodes"),
            CheckKind::Pods => write!(f, "pods"),
            CheckKind::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// Observed vs ready counts for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadinessReport {
    pub total: usize,
    pub ready: usize,
}

impl ReadinessReport {
    pub fn new(total: usize, ready: usize) -> Self {
        Self { total, ready }
    }

    pub fn all_ready(&self) -> bool {
        self.ready == self.total
    }
}

impl fmt::Display for ReadinessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of {} ready", self.ready, self.total)
    }
}

/// A failed assertion within a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub kind: CheckKind,
    pub message: String,
}

impl CheckFailure {
    pub fn new(kind: CheckKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    /// Counts, when the check observes a set of objects
    pub report: Option<ReadinessReport>,
    pub failures: Vec<CheckFailure>,
}

impl CheckResult {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            report: None,
            failures: Vec::new(),
        }
    }

    pub fn with_report(mut self, report: ReadinessReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Record a failed assertion
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(CheckFailure::new(self.kind, message));
    }

    /// Record a failure unless `condition` holds
    pub fn ensure(&mut self, condition: bool, message: impl FnOnce() -> String) {
        if !condition {
            self.fail(message());
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// API server version as reported by `/version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: String,
    pub minor: String,
    pub git_version: String,
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.major, self.minor, self.git_version)
    }
}

/// Full checklist outcome for one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    pub cluster: String,
    /// Worker node count the cluster was checked against
    pub expected_nodes: u32,
    pub server_version: Option<ServerVersion>,
    pub checks: Vec<CheckResult>,
}

impl ClusterReport {
    pub fn new(cluster: impl Into<String>, expected_nodes: u32) -> Self {
        Self {
            cluster: cluster.into(),
            expected_nodes,
            server_version: None,
            checks: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    pub fn check(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckFailure> {
        self.checks.iter().flat_map(|c| c.failures.iter())
    }
}

/// Outcome of one HTTP endpoint check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    pub url: String,
    pub check: CheckResult,
}

impl EndpointReport {
    pub fn new(url: impl Into<String>, check: CheckResult) -> Self {
        Self {
            url: url.into(),
            check,
        }
    }

    pub fn passed(&self) -> bool {
        self.check.passed()
    }
}

/// Outcome of a smoke test run across every cluster
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmokeReport {
    pub clusters: Vec<ClusterReport>,
    /// Endpoint checks, in the order they were configured
    pub endpoints: Vec<EndpointReport>,
}

impl SmokeReport {
    pub fn new(mut clusters: Vec<ClusterReport>) -> Self {
        clusters.sort_by(|a, b| a.cluster.cmp(&b.cluster));
        Self {
            clusters,
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<EndpointReport>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn passed(&self) -> bool {
        self.clusters.iter().all(ClusterReport::passed)
            && self.endpoints.iter().all(EndpointReport::passed)
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterReport> {
        self.clusters.iter().find(|c| c.cluster == name)
    }

    pub fn endpoint(&self, url: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|e| e.url == url)
    }

    /// Every failure, tagged with the cluster or endpoint it came from
    pub fn failures(&self) -> impl Iterator<Item = (&str, &CheckFailure)> {
        let clusters = self
            .clusters
            .iter()
            .flat_map(|c| c.failures().map(move |f| (c.cluster.as_str(), f)));
        let endpoints = self
            .endpoints
            .iter()
            .flat_map(|e| e.check.failures.iter().map(move |f| (e.url.as_str(), f)));
        clusters.chain(endpoints)
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// `Ok` when every check passed, otherwise [`Error::ChecksFailed`]
    pub fn into_result(self) -> Result<Self> {
        match self.failure_count() {
            0 => Ok(self),
            n => Err(Error::ChecksFailed(n)),
        }
    }

    /// Fail the calling test with every collected failure.
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn assert_passed(&self) {
        if !self.passed() {
            panic!("smoke test failed:\n{}", self);
        }
    }
}

impl fmt::Display for SmokeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cluster in &self.clusters {
            let verdict = if cluster.passed() { "PASS" } else { "FAIL" };
            writeln!(f, "{} {}", verdict, cluster.cluster)?;
            for check in &cluster.checks {
                if let Some(report) = check.report {
                    writeln!(f, "  {}: {}", check.kind, report)?;
                }
            }
            for failure in cluster.failures() {
                writeln!(f, "  {}", failure)?;
            }
        }
        for endpoint in &self.endpoints {
            let verdict = if endpoint.passed() { "PASS" } else { "FAIL" };
            writeln!(f, "{} {}", verdict, endpoint.url)?;
            for failure in &endpoint.check.failures {
                writeln!(f, "  {}", failure)?;
            }
        }
        Ok(())
    }
}
