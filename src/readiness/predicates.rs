//! Readiness predicates for the objects the smoke test polls

use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// Node is healthy and ready to accept pods
    pub const NODE_READY: &str = "Ready";
    /// Pod is able to serve requests
    pub const POD_READY: &str = "Ready";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
}

/// Pod phases that count as healthy
pub mod pod_phases {
    pub const RUNNING: &str = "Running";
    pub const SUCCEEDED: &str = "Succeeded";
}

/// Node has a `Ready` condition with status `True`
///
/// Only the first `Ready` condition is considered.
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == condition_types::NODE_READY)
        })
        .map(|c| c.status == condition_status::TRUE)
        .unwrap_or(false)
}

/// Pod is `Running` or `Succeeded` and has a `Ready` condition with status `True`
pub fn is_pod_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };

    let phase_ok = matches!(
        status.phase.as_deref(),
        Some(pod_phases::RUNNING) | Some(pod_phases::SUCCEEDED)
    );
    if !phase_ok {
        return false;
    }

    status
        .conditions
        .as_ref()
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == condition_types::POD_READY)
        })
        .map(|c| c.status == condition_status::TRUE)
        .unwrap_or(false)
}

/// ConfigMap carries at least one entry in `data`
///
/// `binaryData` is not considered.
pub fn config_map_has_data(config_map: &ConfigMap) -> bool {
    config_map.data.as_ref().is_some_and(|d| !d.is_empty())
}

/// Display name used in logs and failure messages
pub fn object_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or("<unnamed>")
}
