// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mapping provider-side copies back to their owning tenant.
//!
//! kube-bind copies a consumer's objects into the provider, marking each copy
//! with the consumer's kube-bind space id and prefixing its name (or
//! namespace) with that id. A set of ConfigMaps relates kube-bind space ids to
//! the space identifiers used to reach each tenant's API.

use crate::constants::kube_bind::{CLUSTER_NAMESPACE_ANNOTATION, CONFIG_MAP_PREFIX, ID_LABEL};
use crate::error::{ResolverError, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// An object's identity in its owning tenant's space
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerIdentity {
    /// Original namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub name: String,
    /// kube-bind space id of the owning tenant
    pub tenant: String,
}

/// Lookups needed to publish results into the right tenant space
pub trait IdentityResolver: Send + Sync {
    /// Identify the tenant-side original of a provider-side copy
    fn resolve_owner_identity(&self, meta: &ObjectMeta) -> Result<OwnerIdentity>;

    /// Space identifier for a kube-bind space id, `None` if not (yet) mapped
    fn space_identifier_for(&self, tenant: &str) -> Option<String>;

    /// Resolve both the original identity and the space it lives in
    fn resolve_space(&self, meta: &ObjectMeta) -> Result<(OwnerIdentity, String)> {
        let owner = self.resolve_owner_identity(meta)?;
        match self.space_identifier_for(&owner.tenant) {
            Some(space) => Ok((owner, space)),
            None => Err(ResolverError::UnmappedTenant(owner.tenant)),
        }
    }
}

/// Analyze an object in the provider and return its identity in the consumer
pub fn analyze_object_id(meta: &ObjectMeta) -> Result<OwnerIdentity> {
    let name = meta.name.clone().unwrap_or_default();
    let tenant = meta
        .annotations
        .as_ref()
        .and_then(|a| a.get(CLUSTER_NAMESPACE_ANNOTATION))
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| {
            ResolverError::MissingProvenance(format!(
                "{} has no '{}' annotation",
                name, CLUSTER_NAMESPACE_ANNOTATION
            ))
        })?;
    let prefix = format!("{}-", tenant);

    match meta.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        None => {
            let original = name.strip_prefix(&prefix).ok_or_else(|| {
                ResolverError::MissingProvenance(format!(
                    "name {:?} does not have prefix for consumer {:?}",
                    name, tenant
                ))
            })?;
            Ok(OwnerIdentity {
                namespace: None,
                name: original.to_string(),
                tenant,
            })
        }
        Some(namespace) => {
            let original = namespace.strip_prefix(&prefix).ok_or_else(|| {
                ResolverError::MissingProvenance(format!(
                    "namespace {:?} does not have prefix for consumer {:?}",
                    namespace, tenant
                ))
            })?;
            Ok(OwnerIdentity {
                namespace: Some(original.to_string()),
                name,
                tenant,
            })
        }
    }
}

#[derive(Debug, Default)]
struct Relation {
    /// space id -> kube-bind space id
    to_kube_bind: HashMap<String, String>,
    /// kube-bind space id -> space id
    from_kube_bind: HashMap<String, String>,
}

/// 1:1 relation between kube-bind space ids and space identifiers
#[derive(Clone, Debug, Default)]
pub struct KubeBindSpaceRelation {
    relation: Arc<Mutex<Relation>>,
}

impl KubeBindSpaceRelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `space_id` with `kube_bind_id`, removing any prior association of either.
    /// An empty `kube_bind_id` removes the association of `space_id`.
    pub fn set_mapping(&self, space_id: &str, kube_bind_id: &str) {
        let mut rel = self.relation.lock().unwrap_or_else(|e| e.into_inner());
        let old_kb = rel.to_kube_bind.get(space_id).cloned().unwrap_or_default();
        if old_kb == kube_bind_id {
            return;
        }
        if kube_bind_id.is_empty() {
            rel.from_kube_bind.remove(&old_kb);
            rel.to_kube_bind.remove(space_id);
            return;
        }
        if let Some(old_space) = rel.from_kube_bind.get(kube_bind_id).cloned() {
            rel.to_kube_bind.remove(&old_space);
        }
        if !old_kb.is_empty() {
            rel.from_kube_bind.remove(&old_kb);
        }
        rel.from_kube_bind
            .insert(kube_bind_id.to_string(), space_id.to_string());
        rel.to_kube_bind
            .insert(space_id.to_string(), kube_bind_id.to_string());
    }

    /// Apply a relation ConfigMap that was added or updated
    pub fn apply_config_map(&self, cm: &ConfigMap) {
        let Some(space_id) = space_id_of(cm) else {
            return;
        };
        let kube_bind_id = cm.labels().get(ID_LABEL).cloned().unwrap_or_default();
        debug!(space_id, kube_bind_id = %kube_bind_id, "Updating kube-bind space relation");
        self.set_mapping(space_id, &kube_bind_id);
    }

    /// Remove the mapping carried by a deleted relation ConfigMap
    pub fn delete_config_map(&self, cm: &ConfigMap) {
        if let Some(space_id) = space_id_of(cm) {
            debug!(space_id, "Removing kube-bind space relation");
            self.set_mapping(space_id, "");
        }
    }

    /// Keep the relation in sync with the ConfigMaps in `namespace` until the watch ends
    pub async fn run(self, client: Client, namespace: String) -> anyhow::Result<()> {
        let config_maps: Api<ConfigMap> = Api::namespaced(client, &namespace);
        let config = watcher::Config::default().labels(ID_LABEL);
        info!("Watching kube-bind space relation ConfigMaps in {}", namespace);

        let mut stream = pin!(watcher(config_maps, config).default_backoff());
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(cm)) | Ok(watcher::Event::InitApply(cm)) => {
                    self.apply_config_map(&cm)
                }
                Ok(watcher::Event::Delete(cm)) => self.delete_config_map(&cm),
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => {}
                Err(e) => warn!("Error watching kube-bind relation ConfigMaps: {}", e),
            }
        }

        Ok(())
    }
}

impl IdentityResolver for KubeBindSpaceRelation {
    fn resolve_owner_identity(&self, meta: &ObjectMeta) -> Result<OwnerIdentity> {
        analyze_object_id(meta)
    }

    fn space_identifier_for(&self, tenant: &str) -> Option<String> {
        let rel = self.relation.lock().unwrap_or_else(|e| e.into_inner());
        rel.from_kube_bind.get(tenant).cloned()
    }
}

fn space_id_of(cm: &ConfigMap) -> Option<&str> {
    cm.metadata
        .name
        .as_deref()
        .and_then(|n| n.strip_prefix(CONFIG_MAP_PREFIX))
        .filter(|id| id.len() > 1)
}
