//! Cluster credentials and their resolution into API clients
//!
//! A credential is a kubeconfig document handed over by the provisioning
//! collaborator as an opaque value. Resolution validates it, derives a REST
//! configuration from its active context, and binds a client to it.

use std::collections::HashSet;
use std::path::Path;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::readiness::KubeClusterApi;

/// Position of the cluster name within the active user's exec arguments,
/// as in `["token", "-i", "<cluster>"]`
pub const EXEC_ARG_CLUSTER_NAME_INDEX: usize = 2;

/// Serialized access descriptor for one cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterCredential {
    document: serde_json::Value,
    name: Option<String>,
}

impl ClusterCredential {
    /// Wrap a kubeconfig document
    pub fn new(document: serde_json::Value) -> Self {
        Self {
            document,
            name: None,
        }
    }

    /// Name the cluster explicitly instead of deriving it from exec arguments
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse a kubeconfig from JSON or YAML text
    pub fn from_text(text: &str) -> Result<Self> {
        let document = serde_yaml::from_str(text)
            .map_err(|e| Error::InvalidCredential(format!("unparseable kubeconfig: {}", e)))?;
        Ok(Self::new(document))
    }

    /// Read a kubeconfig file (JSON or YAML)
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    pub fn document(&self) -> &serde_json::Value {
        &self.document
    }

    /// Explicit cluster name, if the collaborator supplied one
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Canonical wire form: compact JSON
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.document)?)
    }
}

/// REST configuration and API client bound to one cluster
#[derive(Clone)]
pub struct ClusterHandle {
    config: Config,
    client: Client,
}

impl ClusterHandle {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Readiness view over this cluster's client
    pub fn api(&self) -> KubeClusterApi {
        KubeClusterApi::new(self.client.clone())
    }

    /// Cluster name carried in the active user's exec arguments
    pub fn exec_cluster_name(&self) -> Option<&str> {
        exec_cluster_name(&self.config)
    }
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("cluster_url", &self.config.cluster_url)
            .finish_non_exhaustive()
    }
}

/// Resolve a credential into a [`ClusterHandle`]
pub async fn resolve(credential: &ClusterCredential) -> Result<ClusterHandle> {
    let bytes = credential.to_canonical_bytes()?;
    resolve_bytes(&bytes).await
}

/// Resolve a credential from its canonical bytes
pub async fn resolve_bytes(bytes: &[u8]) -> Result<ClusterHandle> {
    validate_kubeconfig(bytes)?;

    let kubeconfig: Kubeconfig = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidCredential(format!("unparseable kubeconfig: {}", e)))?;

    // Active context
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::InvalidCredential(format!("failed to load kubeconfig: {}", e)))?;

    let client = Client::try_from(config.clone())
        .map_err(|e| Error::InvalidCredential(format!("failed to create client: {}", e)))?;

    Ok(ClusterHandle { config, client })
}

/// Cluster name from the exec arguments of a resolved configuration
pub fn exec_cluster_name(config: &Config) -> Option<&str> {
    config
        .auth_info
        .exec
        .as_ref()
        .and_then(|exec| exec.args.as_ref())
        .and_then(|args| args.get(EXEC_ARG_CLUSTER_NAME_INDEX))
        .map(String::as_str)
}

/// Names and references of a kubeconfig, enough to check consistency
#[derive(Deserialize)]
struct KubeconfigIndex {
    #[serde(default)]
    clusters: Option<Vec<Named>>,
    #[serde(default)]
    contexts: Option<Vec<NamedContext>>,
    #[serde(default)]
    users: Option<Vec<Named>>,
    #[serde(rename = "current-context", default)]
    current_context: Option<String>,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct NamedContext {
    name: String,
    #[serde(default)]
    context: Option<ContextRef>,
}

#[derive(Deserialize)]
struct ContextRef {
    cluster: String,
    #[serde(default)]
    user: Option<String>,
}

/// Check a kubeconfig is well formed and free of conflicts
///
/// Rejects duplicate cluster, context or user names, a missing or dangling
/// `current-context`, contexts without a user, and contexts referencing
/// unknown clusters or users.
pub fn validate_kubeconfig(bytes: &[u8]) -> Result<()> {
    let index: KubeconfigIndex = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidCredential(format!("unparseable kubeconfig: {}", e)))?;

    let clusters = unique_names("cluster", index.clusters.iter().flatten().map(|c| &c.name))?;
    let users = unique_names("user", index.users.iter().flatten().map(|u| &u.name))?;
    let contexts = index.contexts.unwrap_or_default();
    let context_names = unique_names("context", contexts.iter().map(|c| &c.name))?;

    if contexts.is_empty() {
        return Err(Error::InvalidCredential("kubeconfig has no contexts".to_string()));
    }

    match index.current_context.as_deref() {
        None | Some("") => {
            return Err(Error::InvalidCredential("kubeconfig has no current-context".to_string()));
        }
        Some(current) if !context_names.contains(current) => {
            return Err(Error::InvalidCredential(format!(
                "current-context {:?} does not match any context",
                current
            )));
        }
        Some(_) => {}
    }

    for named in &contexts {
        let Some(context) = named.context.as_ref() else {
            return Err(Error::InvalidCredential(format!(
                "context {:?} is empty",
                named.name
            )));
        };
        if !clusters.contains(context.cluster.as_str()) {
            return Err(Error::InvalidCredential(format!(
                "context {:?} references unknown cluster {:?}",
                named.name, context.cluster
            )));
        }
        let user = context.user.as_deref().unwrap_or_default();
        if user.is_empty() {
            return Err(Error::InvalidCredential(format!(
                "user was not specified for context {:?}",
                named.name
            )));
        }
        if !users.contains(user) {
            return Err(Error::InvalidCredential(format!(
                "context {:?} references unknown user {:?}",
                named.name, user
            )));
        }
    }

    Ok(())
}

fn unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a String>,
) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(Error::InvalidCredential(format!(
                "duplicate {} entry {:?}",
                kind, name
            )));
        }
    }
    Ok(seen)
}
