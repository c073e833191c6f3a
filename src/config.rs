//! Run configuration read from the environment

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::readiness::{ConfigMapTarget, EndpointCheck, RetryPolicy};

/// Comma-separated kubeconfig paths, one per cluster under test
pub const ENV_KUBECONFIGS: &str = "SMOKE_KUBECONFIGS";
/// Provisioning-state JSON holding the node group resources
pub const ENV_STACK_STATE: &str = "SMOKE_STACK_STATE";
pub const ENV_MAX_RETRIES: &str = "SMOKE_MAX_RETRIES";
pub const ENV_RETRY_INTERVAL_SECS: &str = "SMOKE_RETRY_INTERVAL_SECS";
pub const ENV_CONFIGMAP_NAME: &str = "SMOKE_CONFIGMAP_NAME";
pub const ENV_CONFIGMAP_NAMESPACE: &str = "SMOKE_CONFIGMAP_NAMESPACE";
/// Comma-separated HTTP endpoints that must answer `200 OK`
pub const ENV_ENDPOINTS: &str = "SMOKE_ENDPOINTS";
/// Comma-separated `Name=value` headers sent to every endpoint
pub const ENV_ENDPOINT_HEADERS: &str = "SMOKE_ENDPOINT_HEADERS";
pub const ENV_ENDPOINT_MAX_WAIT_SECS: &str = "SMOKE_ENDPOINT_MAX_WAIT_SECS";

/// Everything a smoke test run needs besides its inputs' contents
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmokeConfig {
    pub retry: RetryPolicy,
    pub config_map: ConfigMapTarget,
    pub kubeconfigs: Vec<PathBuf>,
    pub stack_state: Option<PathBuf>,
    pub endpoints: Vec<String>,
    pub endpoint_headers: Vec<(String, String)>,
    /// Deadline per endpoint; the check's own default when unset
    pub endpoint_max_wait: Option<Duration>,
}

impl SmokeConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(paths) = get(ENV_KUBECONFIGS) {
            config.kubeconfigs = split_list(&paths).map(PathBuf::from).collect();
        }

        config.stack_state = get(ENV_STACK_STATE).map(PathBuf::from);

        if let Some(raw) = get(ENV_MAX_RETRIES) {
            let attempts: u32 = parse(ENV_MAX_RETRIES, &raw)?;
            if attempts == 0 {
                return Err(Error::ConfigError(format!(
                    "{} must be at least 1",
                    ENV_MAX_RETRIES
                )));
            }
            config.retry.max_attempts = attempts;
        }

        if let Some(raw) = get(ENV_RETRY_INTERVAL_SECS) {
            config.retry.interval = Duration::from_secs(parse(ENV_RETRY_INTERVAL_SECS, &raw)?);
        }

        if let Some(name) = get(ENV_CONFIGMAP_NAME) {
            config.config_map.name = name;
        }
        if let Some(namespace) = get(ENV_CONFIGMAP_NAMESPACE) {
            config.config_map.namespace = namespace;
        }

        if let Some(endpoints) = get(ENV_ENDPOINTS) {
            config.endpoints = split_list(&endpoints).map(str::to_string).collect();
        }

        if let Some(headers) = get(ENV_ENDPOINT_HEADERS) {
            config.endpoint_headers = split_list(&headers)
                .map(parse_header)
                .collect::<Result<_>>()?;
        }

        if let Some(raw) = get(ENV_ENDPOINT_MAX_WAIT_SECS) {
            let secs = parse(ENV_ENDPOINT_MAX_WAIT_SECS, &raw)?;
            config.endpoint_max_wait = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// One check per configured endpoint, each sending every configured header
    pub fn endpoint_checks(&self) -> Vec<EndpointCheck> {
        self.endpoints
            .iter()
            .map(|endpoint| {
                let mut check = EndpointCheck::new(endpoint.as_str());
                for (name, value) in &self.endpoint_headers {
                    check = check.with_header(name.as_str(), value.as_str());
                }
                match self.endpoint_max_wait {
                    Some(max_wait) => check.with_max_wait(max_wait),
                    None => check,
                }
            })
            .collect()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::ConfigError(format!(
            "{} entry {:?} is not Name=value",
            ENV_ENDPOINT_HEADERS, raw
        ))),
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("{}={:?}: {}", key, raw, e)))
}
