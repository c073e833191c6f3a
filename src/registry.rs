//! Registry of the clusters under test
//!
//! Built once from the credentials handed over by the provisioning
//! collaborator and read-only afterwards.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::credentials::{ClusterCredential, ClusterHandle, EXEC_ARG_CLUSTER_NAME_INDEX};
use crate::error::{Error, Result};

/// Cluster name to client handle
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: BTreeMap<String, ClusterHandle>,
}

impl ClusterRegistry {
    /// Resolve every credential and key the handles by cluster name.
    ///
    /// Fails on the first credential that does not resolve. When two
    /// credentials yield the same cluster name, the later one replaces the
    /// earlier.
    pub async fn build<'a, I>(credentials: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ClusterCredential>,
    {
        let mut registry = Self::default();

        for credential in credentials {
            let bytes = credential.to_canonical_bytes()?;
            let handle = crate::credentials::resolve_bytes(&bytes).await?;
            let name = cluster_name(credential, &handle)?;

            info!(
                cluster = %name,
                server = %handle.config().cluster_url,
                "Resolved cluster credential"
            );
            registry.insert(name, handle);
        }

        Ok(registry)
    }

    /// Insert a handle, replacing any previous handle under the same name
    pub fn insert(&mut self, name: String, handle: ClusterHandle) {
        if self.clusters.contains_key(&name) {
            warn!(cluster = %name, "Duplicate cluster name, replacing earlier credential");
        }
        self.clusters.insert(name, handle);
    }

    pub fn get(&self, name: &str) -> Option<&ClusterHandle> {
        self.clusters.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClusterHandle)> {
        self.clusters
            .iter()
            .map(|(name, handle)| (name.as_str(), handle))
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Explicit name if supplied, otherwise the positional exec argument
fn cluster_name(credential: &ClusterCredential, handle: &ClusterHandle) -> Result<String> {
    if let Some(name) = credential.explicit_name() {
        return Ok(name.to_string());
    }

    handle
        .exec_cluster_name()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidCredential(format!(
                "no cluster name: user exec args have no element at index {}",
                EXEC_ARG_CLUSTER_NAME_INDEX
            ))
        })
}
