//! Cluster API surface used by the readiness engine
//!
//! The engine only needs a handful of read calls. [`ClusterApi`] abstracts
//! them so the polling logic can be exercised against scripted clusters in
//! tests; [`KubeClusterApi`] is the implementation backed by a real client.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::error::Result;

/// Read-only view of one cluster's API server
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// API server version info
    async fn server_version(&self) -> Result<Info>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn get_node(&self, name: &str) -> Result<Node>;

    /// Pods across all namespaces
    async fn list_pods(&self) -> Result<Vec<Pod>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;
}

#[async_trait]
impl<T: ClusterApi + ?Sized> ClusterApi for &T {
    async fn server_version(&self) -> Result<Info> {
        (**self).server_version().await
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        (**self).get_config_map(namespace, name).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        (**self).list_nodes().await
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        (**self).get_node(name).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        (**self).list_pods().await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        (**self).get_pod(namespace, name).await
    }
}

/// [`ClusterApi`] backed by a kube [`Client`]
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn server_version(&self) -> Result<Info> {
        Ok(self.client.apiserver_version().await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.get(name).await?)
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }
}
