pub mod api;
pub mod endpoint;
pub mod engine;
pub mod predicates;
pub mod retry;
pub mod state_machine;

pub use api::{ClusterApi, KubeClusterApi};
pub use endpoint::{EndpointCheck, HttpFetch, HttpResponse, ReqwestFetch};
pub use engine::{
    ConfigMapTarget, DEFAULT_CONFIG_MAP_NAME, DEFAULT_CONFIG_MAP_NAMESPACE, ReadinessEngine,
};
pub use predicates::{config_map_has_data, is_node_ready, is_pod_ready};
pub use retry::{
    Backoff, Convergence, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, PollOutcome, RetryPolicy,
    RetryState, poll_until,
};
pub use state_machine::{CheckEvent, CheckPhase, InvalidTransition};
