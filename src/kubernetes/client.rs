// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Tenant space client creation and kubeconfig utilities

use crate::constants::space::{DEFAULT_PROVIDER_NAMESPACE, KUBECONFIG_KEY};
use crate::error::{ResolverError, Result};
use crate::types::Space;
use k8s_openapi::api::core::v1::Secret;
use kube::{config::KubeConfigOptions, Api, Client};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Reaches the API of a tenant space
pub trait SpaceDirectory: Send + Sync {
    /// Client for `space_id`, registered in `provider_namespace`
    fn client_for(
        &self,
        space_id: &str,
        provider_namespace: &str,
    ) -> impl Future<Output = Result<Client>> + Send;
}

/// Space directory backed by `Space` objects and their kubeconfig Secrets
pub struct SpaceClients {
    manager_client: Client,
    clients: RwLock<HashMap<String, Client>>,
}

impl SpaceClients {
    pub fn new(manager_client: Client) -> Self {
        Self {
            manager_client,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Build a client for a ready space from its in-cluster kubeconfig secret
    #[instrument(skip(self))]
    async fn connect(&self, space_id: &str, namespace: &str) -> Result<Client> {
        let spaces: Api<Space> = Api::namespaced(self.manager_client.clone(), namespace);
        let space = spaces.get(space_id).await?;

        if !space.is_ready() {
            return Err(ResolverError::SpaceNotReady(format!(
                "{}/{}",
                namespace, space_id
            )));
        }

        let Some(secret_ref) = space.in_cluster_secret() else {
            return Err(ResolverError::KubeconfigError(format!(
                "space {}/{} has no inClusterSecretRef",
                namespace, space_id
            )));
        };
        let secret_name = secret_ref.name.clone().unwrap_or_default();
        let secret_namespace = secret_ref
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string());

        info!(
            "Getting kubeconfig secret '{}/{}' for space '{}'...",
            secret_namespace, secret_name, space_id
        );

        let secrets: Api<Secret> = Api::namespaced(self.manager_client.clone(), &secret_namespace);
        let secret = secrets.get(&secret_name).await.map_err(|e| {
            ResolverError::KubeconfigError(format!(
                "Failed to get kubeconfig secret for space {}: {}",
                space_id, e
            ))
        })?;

        let kubeconfig = kubeconfig_from_secret(&secret, space_id)?;
        create_client_from_kubeconfig(&kubeconfig).await
    }
}

impl SpaceDirectory for SpaceClients {
    async fn client_for(&self, space_id: &str, provider_namespace: &str) -> Result<Client> {
        let namespace = if provider_namespace.is_empty() {
            DEFAULT_PROVIDER_NAMESPACE
        } else {
            provider_namespace
        };
        let key = format!("{}/{}", namespace, space_id);

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let client = self.connect(space_id, namespace).await?;
        debug!("Caching client for space {}", key);
        self.clients.write().await.insert(key, client.clone());
        Ok(client)
    }
}

/// Extract the kubeconfig text from a space's secret
fn kubeconfig_from_secret(secret: &Secret, space_id: &str) -> Result<String> {
    let Some(data) = secret.data.as_ref() else {
        return Err(ResolverError::KubeconfigError(format!(
            "Kubeconfig secret for space {} has no data",
            space_id
        )));
    };

    let Some(kubeconfig_data) = data.get(KUBECONFIG_KEY) else {
        return Err(ResolverError::KubeconfigError(format!(
            "Kubeconfig secret for space {} does not contain '{}' key",
            space_id, KUBECONFIG_KEY
        )));
    };

    String::from_utf8(kubeconfig_data.0.clone()).map_err(|e| {
        ResolverError::KubeconfigError(format!(
            "Failed to decode kubeconfig for space {}: {}",
            space_id, e
        ))
    })
}

/// Create a Kubernetes client from a kubeconfig string
async fn create_client_from_kubeconfig(kubeconfig: &str) -> Result<Client> {
    use kube::config::Kubeconfig;

    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| ResolverError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                ResolverError::KubeconfigError(format!("Failed to create config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| ResolverError::KubeconfigError(format!("Failed to create client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_secret(data: Option<BTreeMap<String, ByteString>>) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("space-1-kubeconfig".to_string()),
                ..Default::default()
            },
            data,
            ..Default::default()
        }
    }

    #[test]
    fn test_kubeconfig_from_secret() {
        let secret = make_secret(Some(BTreeMap::from([(
            KUBECONFIG_KEY.to_string(),
            ByteString(b"apiVersion: v1".to_vec()),
        )])));

        assert_eq!(
            kubeconfig_from_secret(&secret, "space-1").unwrap(),
            "apiVersion: v1"
        );
    }

    #[test]
    fn test_kubeconfig_from_secret_without_data() {
        let err = kubeconfig_from_secret(&make_secret(None), "space-1").unwrap_err();
        assert!(matches!(err, ResolverError::KubeconfigError(_)));
    }

    #[test]
    fn test_kubeconfig_from_secret_wrong_key() {
        let secret = make_secret(Some(BTreeMap::from([(
            "value".to_string(),
            ByteString(b"apiVersion: v1".to_vec()),
        )])));

        assert!(kubeconfig_from_secret(&secret, "space-1").is_err());
    }

    #[tokio::test]
    async fn test_create_client_from_invalid_kubeconfig() {
        let err = create_client_from_kubeconfig("not: [valid")
            .await
            .err()
            .expect("kubeconfig should be rejected");
        assert!(matches!(err, ResolverError::KubeconfigError(_)));
    }

    #[tokio::test]
    async fn test_client_for_space_not_ready() {
        let space = json!({
            "apiVersion": "space.kubestellar.io/v1alpha1",
            "kind": "Space",
            "metadata": { "name": "space-1", "namespace": "spaceprovider-default" },
            "spec": {},
            "status": { "Phase": "Initializing" },
        });
        let client = MockService::new()
            .on_get(
                "/apis/space.kubestellar.io/v1alpha1/namespaces/spaceprovider-default/spaces/space-1",
                200,
                &space.to_string(),
            )
            .into_client();

        let directory = SpaceClients::new(client);
        let err = directory
            .client_for("space-1", "")
            .await
            .err()
            .expect("space is not ready");
        assert!(matches!(err, ResolverError::SpaceNotReady(_)));
    }

    #[tokio::test]
    async fn test_client_for_unknown_space() {
        let directory = SpaceClients::new(MockService::new().into_client());
        let err = directory
            .client_for("missing", "provider-a")
            .await
            .err()
            .expect("space does not exist");
        assert!(err.is_not_found());
    }
}
