// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::space::PHASE_READY;
use k8s_openapi::api::core::v1::SecretReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A tenant space as registered with a space provider
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "space.kubestellar.io", version = "v1alpha1", kind = "Space")]
#[kube(namespaced)]
#[kube(status = "SpaceStatus")]
pub struct SpaceSpec {
    #[serde(rename = "SpaceProviderDescName", default)]
    pub space_provider_desc_name: String,
    #[serde(rename = "Type", default)]
    pub space_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpaceStatus {
    #[serde(rename = "Phase", skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cluster_secret_ref: Option<SecretReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_secret_ref: Option<SecretReference>,
}

impl Space {
    /// Check if the space provider reports this space as usable
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|p| p == PHASE_READY)
    }

    /// Secret holding the kubeconfig for in-cluster access
    pub fn in_cluster_secret(&self) -> Option<&SecretReference> {
        self.status.as_ref()?.in_cluster_secret_ref.as_ref()
    }
}
