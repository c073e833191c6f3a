//! Readiness convergence checks
//!
//! The checklist for one cluster runs sequentially:
//! 1. API server version (logged for context)
//! 2. The node-authentication ConfigMap exists and has data
//! 3. The node count matches the expected worker capacity, then every
//!    node reports `Ready`
//! 4. Every pod across all namespaces is `Running`/`Succeeded` and `Ready`
//!
//! API errors while polling are treated as "not ready yet" and only spend
//! retry budget, whatever their status code. A check whose budget runs out
//! records a [`CheckFailure`] and the checklist moves on.
//!
//! [`CheckFailure`]: crate::report::CheckFailure

use tracing::{debug, info, warn};

use super::api::ClusterApi;
use super::predicates::{config_map_has_data, is_node_ready, is_pod_ready, object_name};
use super::retry::{Convergence, PollOutcome, RetryPolicy, poll_until};
use crate::error::Error;
use crate::report::{CheckKind, CheckResult, ClusterReport, ReadinessReport, ServerVersion};

/// Name of the EKS node-authentication ConfigMap
pub const DEFAULT_CONFIG_MAP_NAME: &str = "aws-auth";

/// Namespace holding the node-authentication ConfigMap
pub const DEFAULT_CONFIG_MAP_NAMESPACE: &str = "kube-system";

/// Namespace assumed for pods listed without one
const FALLBACK_POD_NAMESPACE: &str = "default";

/// The well-known ConfigMap whose presence the checklist asserts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigMapTarget {
    pub namespace: String,
    pub name: String,
}

impl Default for ConfigMapTarget {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_CONFIG_MAP_NAMESPACE.to_string(),
            name: DEFAULT_CONFIG_MAP_NAME.to_string(),
        }
    }
}

/// Runs readiness checks against a cluster with a shared retry policy
#[derive(Clone, Debug, Default)]
pub struct ReadinessEngine {
    policy: RetryPolicy,
    config_map: ConfigMapTarget,
}

impl ReadinessEngine {
    pub fn new(policy: RetryPolicy, config_map: ConfigMapTarget) -> Self {
        Self { policy, config_map }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn config_map(&self) -> &ConfigMapTarget {
        &self.config_map
    }

    /// Run the full checklist against one cluster
    pub async fn run_checklist<A>(
        &self,
        cluster: &str,
        api: &A,
        expected_nodes: u32,
    ) -> ClusterReport
    where
        A: ClusterApi + ?Sized,
    {
        info!("Testing Cluster: {}", cluster);

        let mut report = ClusterReport::new(cluster, expected_nodes);

        let (version, version_check) = self.check_api_server(api).await;
        report.server_version = version;
        report.checks.push(version_check);

        let config_map_check = self.check_config_map(api).await;
        report.checks.push(config_map_check);
        let nodes_check = self.check_nodes(api, expected_nodes).await;
        report.checks.push(nodes_check);
        let pods_check = self.check_pods(api).await;
        report.checks.push(pods_check);

        if report.passed() {
            info!(cluster = %cluster, "Cluster passed all smoke checks");
        } else {
            warn!(
                cluster = %cluster,
                failures = report.failures().count(),
                "Cluster failed smoke checks"
            );
        }

        report
    }

    /// Fetch and log the API server version
    pub async fn check_api_server<A>(&self, api: &A) -> (Option<ServerVersion>, CheckResult)
    where
        A: ClusterApi + ?Sized,
    {
        let what = "API server version";
        let outcome = poll_until(&self.policy, what, "returned", move |_| async move {
            match api.server_version().await {
                Ok(info) => PollOutcome::Ready(info),
                Err(e) => {
                    debug!(
                        error = %e,
                        transient = e.is_retryable(),
                        "API server version request failed"
                    );
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        let mut result = CheckResult::new(CheckKind::ApiServer);
        let attempts = outcome.attempts();
        match outcome.into_observed() {
            Some(info) => {
                info!("API Server Version: {}.{}", info.major, info.minor);
                info!("API Server GitVersion: {}", info.git_version);
                let version = ServerVersion {
                    major: info.major,
                    minor: info.minor,
                    git_version: info.git_version,
                };
                (Some(version), result)
            }
            None => {
                result.fail(exhausted(what, attempts).to_string());
                (None, result)
            }
        }
    }

    /// Assert the node-authentication ConfigMap exists and has data
    pub async fn check_config_map<A>(&self, api: &A) -> CheckResult
    where
        A: ClusterApi + ?Sized,
    {
        let target = &self.config_map;
        let what = format!("{:?} ConfigMap", target.name);

        let outcome = poll_until(&self.policy, &what, "returned", move |_| async move {
            match api.get_config_map(&target.namespace, &target.name).await {
                Ok(cm) if config_map_has_data(&cm) => PollOutcome::Ready(cm),
                Ok(cm) => {
                    debug!(name = %target.name, "ConfigMap exists but has no data yet");
                    PollOutcome::NotReady(Some(cm))
                }
                Err(e) => {
                    debug!(
                        name = %target.name,
                        error = %e,
                        transient = e.is_retryable(),
                        "ConfigMap request failed"
                    );
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        let mut result = CheckResult::new(CheckKind::ConfigMap);
        match outcome {
            Convergence::Converged { value, .. } => {
                let keys: Vec<&String> = value.data.iter().flat_map(|d| d.keys()).collect();
                info!("EKS ConfigMap {:?} exists and has data", target.name);
                debug!(keys = ?keys, "ConfigMap data keys");
            }
            Convergence::Exhausted {
                last: Some(_),
                attempts,
            } => {
                result.fail(format!(
                    "{:?} ConfigMap should not be empty ({})",
                    target.name,
                    exhausted(&what, attempts)
                ));
            }
            Convergence::Exhausted {
                last: None,
                attempts,
            } => {
                result.fail(format!(
                    "EKS ConfigMap {:?} does not exist in namespace {:?} ({})",
                    target.name,
                    target.namespace,
                    exhausted(&what, attempts)
                ));
            }
        }
        result
    }

    /// Assert the node count matches `expected`, then that every node is ready
    ///
    /// A count mismatch is recorded but does not stop the per-node checks.
    pub async fn check_nodes<A>(&self, api: &A, expected: u32) -> CheckResult
    where
        A: ClusterApi + ?Sized,
    {
        info!("Total Desired Worker Node Count: {}", expected);

        let expected_len = expected as usize;
        let what = format!("desired worker Node count of ({}) instances", expected);
        let listed = poll_until(&self.policy, &what, "running", move |_| async move {
            match api.list_nodes().await {
                Ok(nodes) if nodes.len() == expected_len => PollOutcome::Ready(nodes),
                Ok(nodes) => {
                    debug!(
                        observed = nodes.len(),
                        expected,
                        "Node count does not match yet"
                    );
                    PollOutcome::NotReady(Some(nodes))
                }
                Err(e) => {
                    debug!(
                        error = %e,
                        transient = e.is_retryable(),
                        "Node list request failed"
                    );
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        let mut result = CheckResult::new(CheckKind::Nodes);
        let attempts = listed.attempts();
        let Some(nodes) = listed.into_observed() else {
            result.fail(format!(
                "The Nodes list was never returned ({})",
                exhausted(&what, attempts)
            ));
            return result.with_report(ReadinessReport::default());
        };

        result.ensure(nodes.len() == expected_len, || {
            format!(
                "{} out of {} desired worker Nodes are instantiated and running",
                nodes.len(),
                expected
            )
        });

        let mut ready = 0;
        for node in &nodes {
            let name = object_name(&node.metadata);
            let node_ready = self.wait_for_node(api, name).await;
            info!("Node: {} | Ready Status: {}", name, node_ready);
            if node_ready {
                ready += 1;
            }
        }

        let report = ReadinessReport::new(nodes.len(), ready);
        result.ensure(report.all_ready(), || {
            format!("{} out of {} Nodes are ready", report.ready, report.total)
        });
        info!("{} out of {} Nodes are ready", report.ready, report.total);

        result.with_report(report)
    }

    /// Assert every pod across all namespaces is ready
    ///
    /// The first successful list is taken as complete; the total pod count is
    /// not known ahead of time.
    pub async fn check_pods<A>(&self, api: &A) -> CheckResult
    where
        A: ClusterApi + ?Sized,
    {
        let what = "list of all Pods";
        let listed = poll_until(&self.policy, what, "returned", move |_| async move {
            match api.list_pods().await {
                Ok(pods) => PollOutcome::Ready(pods),
                Err(e) => {
                    debug!(
                        error = %e,
                        transient = e.is_retryable(),
                        "Pod list request failed"
                    );
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        let mut result = CheckResult::new(CheckKind::Pods);
        let attempts = listed.attempts();
        let Some(pods) = listed.into_observed() else {
            result.fail(format!(
                "The Pods list was never returned ({})",
                exhausted(what, attempts)
            ));
            return result.with_report(ReadinessReport::default());
        };

        let mut ready = 0;
        for pod in &pods {
            let name = object_name(&pod.metadata);
            let namespace = pod
                .metadata
                .namespace
                .as_deref()
                .unwrap_or(FALLBACK_POD_NAMESPACE);
            let pod_ready = self.wait_for_pod(api, namespace, name).await;
            info!("Pod: {} | Ready Status: {}", name, pod_ready);
            if pod_ready {
                ready += 1;
            }
        }

        let report = ReadinessReport::new(pods.len(), ready);
        result.ensure(report.ready > 0, || "No Pods are ready".to_string());
        result.ensure(report.all_ready(), || {
            format!("{} out of {} Pods are ready", report.ready, report.total)
        });
        info!("{} out of {} Pods are ready", report.ready, report.total);

        result.with_report(report)
    }

    /// Poll one node until it reports `Ready`, with its own retry budget
    pub async fn wait_for_node<A>(&self, api: &A, name: &str) -> bool
    where
        A: ClusterApi + ?Sized,
    {
        let what = format!("Node {:?}", name);
        let outcome = poll_until(&self.policy, &what, "ready", move |_| async move {
            match api.get_node(name).await {
                Ok(node) if is_node_ready(&node) => PollOutcome::Ready(()),
                Ok(_) => PollOutcome::NotReady(None),
                Err(e) => {
                    debug!(node = %name, error = %e, "Node request failed");
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        if !outcome.is_converged() {
            warn!("{}", exhausted(&what, outcome.attempts()));
        }
        outcome.is_converged()
    }

    /// Poll one pod until it is `Running`/`Succeeded` and `Ready`, with its own retry budget
    pub async fn wait_for_pod<A>(&self, api: &A, namespace: &str, name: &str) -> bool
    where
        A: ClusterApi + ?Sized,
    {
        let what = format!("Pod {:?}", name);
        let outcome = poll_until(&self.policy, &what, "ready", move |_| async move {
            match api.get_pod(namespace, name).await {
                Ok(pod) if is_pod_ready(&pod) => PollOutcome::Ready(()),
                Ok(_) => PollOutcome::NotReady(None),
                Err(e) => {
                    debug!(pod = %name, namespace = %namespace, error = %e, "Pod request failed");
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        if !outcome.is_converged() {
            warn!("{}", exhausted(&what, outcome.attempts()));
        }
        outcome.is_converged()
    }
}

fn exhausted(what: &str, attempts: u32) -> Error {
    Error::ConvergenceExhausted {
        what: what.to_string(),
        attempts,
    }
}
