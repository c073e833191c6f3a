//! Live cluster access for integration tests
//!
//! Uses the kubeconfig named by `KUBECONFIG`, or `~/.kube/config`.

use std::path::PathBuf;
use std::sync::Arc;

use cluster_smoke::{ClusterCredential, ClusterRegistry, install_crypto_provider};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Name the live cluster is registered under
pub const LIVE_CLUSTER: &str = "live";

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("No kubeconfig found: set KUBECONFIG or create ~/.kube/config")]
    NoKubeconfig,

    #[error("Failed to load live cluster: {0}")]
    Smoke(#[from] cluster_smoke::Error),
}

/// Global shared cluster instance
static SHARED_CLUSTER: OnceCell<Arc<SharedTestCluster>> = OnceCell::const_new();

/// The live cluster every integration test runs against
pub struct SharedTestCluster {
    pub credential: ClusterCredential,
}

impl SharedTestCluster {
    /// Get or initialize the shared cluster
    pub async fn get() -> Result<Arc<SharedTestCluster>, ClusterError> {
        SHARED_CLUSTER
            .get_or_try_init(|| async {
                let cluster = Self::connect().await?;
                Ok(Arc::new(cluster))
            })
            .await
            .map(Arc::clone)
    }

    /// Registry holding only the live cluster
    pub async fn registry(&self) -> Result<ClusterRegistry, ClusterError> {
        Ok(ClusterRegistry::build([&self.credential]).await?)
    }

    async fn connect() -> Result<Self, ClusterError> {
        install_crypto_provider()?;

        // Only the first entry of a path-list KUBECONFIG is used
        let path = std::env::var_os("KUBECONFIG")
            .and_then(|paths| std::env::split_paths(&paths).next())
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube/config"))
            })
            .filter(|path| path.exists())
            .ok_or(ClusterError::NoKubeconfig)?;

        // Local clusters carry no exec plugin, so name the cluster explicitly
        let credential = ClusterCredential::read_from(&path)?.with_name(LIVE_CLUSTER);

        let registry = ClusterRegistry::build([&credential]).await?;
        if let Some(handle) = registry.get(LIVE_CLUSTER) {
            let version = handle
                .client()
                .apiserver_version()
                .await
                .map_err(cluster_smoke::Error::from)?;
            tracing::info!(
                "Connected to Kubernetes cluster: {} {}",
                version.platform,
                version.git_version
            );
        }

        Ok(Self { credential })
    }
}
