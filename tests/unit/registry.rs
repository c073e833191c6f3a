//! Unit tests for building the cluster registry

use cluster_smoke::{ClusterCredential, ClusterRegistry, Error, install_crypto_provider};
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_clusters_keyed_by_exec_name() {
    install_crypto_provider().unwrap();
    let credentials = vec![
        eks_credential("prod", "https://prod.eks.example.com"),
        eks_credential("dev", "https://dev.eks.example.com"),
    ];

    let registry = ClusterRegistry::build(&credentials).await.unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["dev", "prod"]);
    assert_eq!(
        registry.get("prod").unwrap().config().cluster_url.host(),
        Some("prod.eks.example.com")
    );
}

#[tokio::test]
async fn test_duplicate_cluster_name_last_wins() {
    install_crypto_provider().unwrap();
    let credentials = vec![
        eks_credential("prod", "https://first.eks.example.com"),
        eks_credential("prod", "https://second.eks.example.com"),
    ];

    let registry = ClusterRegistry::build(&credentials).await.unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.get("prod").unwrap().config().cluster_url.host(),
        Some("second.eks.example.com")
    );
}

#[tokio::test]
async fn test_explicit_name_takes_precedence() {
    install_crypto_provider().unwrap();
    let credentials = vec![
        ClusterCredential::new(token_kubeconfig("https://127.0.0.1:6443")).with_name("kind"),
        eks_credential("prod", "https://prod.eks.example.com").with_name("production"),
    ];

    let registry = ClusterRegistry::build(&credentials).await.unwrap();

    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["kind", "production"]
    );
    assert!(registry.get("prod").is_none());
}

#[tokio::test]
async fn test_unnamed_credential_without_exec_rejected() {
    install_crypto_provider().unwrap();
    let credential = ClusterCredential::new(token_kubeconfig("https://127.0.0.1:6443"));
    let credentials = vec![credential];

    let err = ClusterRegistry::build(&credentials).await.unwrap_err();

    assert!(matches!(err, Error::InvalidCredential(_)));
    assert!(err.to_string().contains("index 2"));
}

#[tokio::test]
async fn test_short_exec_args_rejected() {
    install_crypto_provider().unwrap();
    let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
    doc["users"][0]["user"]["exec"]["args"] = json!([
        "-c",
        "printf '%s' '{\"apiVersion\":\"client.authentication.k8s.io/v1beta1\",\"kind\":\"ExecCredential\",\"status\":{\"token\":\"t\"}}'"
    ]);

    let err = ClusterRegistry::build(&[ClusterCredential::new(doc)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidCredential(_)));
}

#[tokio::test]
async fn test_one_malformed_credential_fails_the_build() {
    install_crypto_provider().unwrap();
    let credentials = vec![
        eks_credential("prod", "https://prod.eks.example.com"),
        ClusterCredential::new(json!({"kind": "Config", "contexts": []})),
    ];

    let result = ClusterRegistry::build(&credentials).await;

    assert!(matches!(result, Err(Error::InvalidCredential(_))));
}

#[tokio::test]
async fn test_empty_input_builds_empty_registry() {
    let credentials: Vec<ClusterCredential> = Vec::new();
    let registry = ClusterRegistry::build(&credentials).await.unwrap();
    assert!(registry.is_empty());
}
