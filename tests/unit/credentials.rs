//! Unit tests for credential parsing and resolution

use std::io::Write;

use cluster_smoke::credentials::{resolve, resolve_bytes, validate_kubeconfig};
use cluster_smoke::{ClusterCredential, Error, install_crypto_provider};
use serde_json::json;

use crate::common::*;

mod resolve_tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_eks_kubeconfig() {
        install_crypto_provider().unwrap();
        let credential = eks_credential("prod", "https://prod.eks.example.com");

        let handle = resolve(&credential).await.unwrap();

        assert_eq!(
            handle.config().cluster_url.host(),
            Some("prod.eks.example.com")
        );
        assert_eq!(handle.exec_cluster_name(), Some("prod"));
    }

    #[tokio::test]
    async fn test_token_kubeconfig_has_no_exec_name() {
        install_crypto_provider().unwrap();
        let credential = ClusterCredential::new(token_kubeconfig("https://127.0.0.1:6443"));

        let handle = resolve(&credential).await.unwrap();

        assert_eq!(handle.exec_cluster_name(), None);
        assert_eq!(handle.config().cluster_url.port_u16(), Some(6443));
    }

    #[tokio::test]
    async fn test_garbage_bytes_rejected() {
        let result = resolve_bytes(b"not a kubeconfig").await;
        assert!(matches!(result, Err(Error::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn test_kubeconfig_without_contexts_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        doc["contexts"] = json!([]);

        let result = resolve(&ClusterCredential::new(doc)).await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert!(err.to_string().contains("no contexts"));
    }

    #[tokio::test]
    async fn test_context_with_unknown_cluster_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        doc["contexts"][0]["context"]["cluster"] = json!("elsewhere");

        let err = resolve(&ClusterCredential::new(doc)).await.unwrap_err();

        assert!(err.to_string().contains("unknown cluster"));
    }

    #[tokio::test]
    async fn test_missing_current_context_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        doc.as_object_mut().unwrap().remove("current-context");

        let err = resolve(&ClusterCredential::new(doc)).await.unwrap_err();

        assert!(err.to_string().contains("current-context"));
    }
}

mod validate_tests {
    use super::*;

    fn validate(doc: &serde_json::Value) -> cluster_smoke::Result<()> {
        validate_kubeconfig(&serde_json::to_vec(doc).unwrap())
    }

    #[test]
    fn test_fixture_kubeconfigs_are_valid() {
        validate(&eks_kubeconfig("prod", "https://prod.eks.example.com")).unwrap();
        validate(&token_kubeconfig("https://127.0.0.1:6443")).unwrap();
    }

    #[test]
    fn test_duplicate_clusters_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        let cluster = doc["clusters"][0].clone();
        doc["clusters"].as_array_mut().unwrap().push(cluster);

        let err = validate(&doc).unwrap_err();

        assert!(err.to_string().contains("duplicate cluster"));
    }

    #[test]
    fn test_duplicate_users_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        let user = doc["users"][0].clone();
        doc["users"].as_array_mut().unwrap().push(user);

        let err = validate(&doc).unwrap_err();
        assert!(err.to_string().contains("duplicate user"));
    }

    #[test]
    fn test_empty_context_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        let context = doc["contexts"][0].as_object_mut().unwrap();
        context.remove("context");

        assert!(validate(&doc).unwrap_err().to_string().contains("is empty"));
    }

    #[test]
    fn test_context_without_user_rejected() {
        let mut doc = token_kubeconfig("https://127.0.0.1:6443");
        doc["contexts"][0]["context"]
            .as_object_mut()
            .unwrap()
            .remove("user");

        let err = validate(&doc).unwrap_err();

        assert!(matches!(err, Error::InvalidCredential(_)));
        assert!(err.to_string().contains("user was not specified"));
    }

    #[test]
    fn test_context_with_empty_user_rejected() {
        let mut doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        doc["contexts"][0]["context"]["user"] = json!("");

        let err = validate(&doc).unwrap_err();

        assert!(err.to_string().contains("user was not specified"));
    }
}

mod text_tests {
    use super::*;

    #[test]
    fn test_yaml_kubeconfig_matches_json() {
        let doc = eks_kubeconfig("prod", "https://prod.eks.example.com");
        let yaml = serde_yaml::to_string(&doc).unwrap();

        let credential = ClusterCredential::from_text(&yaml).unwrap();

        assert_eq!(credential.document(), &doc);
        assert_eq!(credential.explicit_name(), None);
    }

    #[test]
    fn test_unparseable_text_rejected() {
        let result = ClusterCredential::from_text("clusters: [unclosed");
        assert!(matches!(result, Err(Error::InvalidCredential(_))));
    }

    #[test]
    fn test_read_from_file() {
        let doc = eks_kubeconfig("dev", "https://dev.eks.example.com");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(doc.to_string().as_bytes()).unwrap();

        let credential = ClusterCredential::read_from(file.path()).unwrap();

        assert_eq!(credential.document(), &doc);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = ClusterCredential::read_from(std::path::Path::new("/nonexistent/kubeconfig"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_explicit_name() {
        let credential =
            eks_credential("prod", "https://prod.eks.example.com").with_name("prod-override");
        assert_eq!(credential.explicit_name(), Some("prod-override"));
    }
}
