// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use k8s_openapi::ClusterResourceScope;
use kube::api::ObjectMeta;
use kube::{CustomResource, Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const GROUP: &str = "edge.kubestellar.io";
pub const VERSION: &str = "v2alpha1";

/// Policy object selecting Locations by label selector
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "edge.kubestellar.io", version = "v2alpha1", kind = "EdgePlacement")]
#[serde(rename_all = "camelCase")]
pub struct EdgePlacementSpec {
    /// A Location is selected when it matches any of these selectors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_selectors: Vec<LabelSelector>,
}

/// Groups SyncTargets by label selector
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "edge.kubestellar.io", version = "v2alpha1", kind = "Location")]
#[serde(rename_all = "camelCase")]
pub struct LocationSpec {
    #[serde(default)]
    pub resource: GroupVersionResource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Selects the SyncTargets of this Location; absent selects nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct GroupVersionResource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// One addressable execution agent
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "edge.kubestellar.io", version = "v2alpha1", kind = "SyncTarget")]
#[serde(rename_all = "camelCase")]
pub struct SyncTargetSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cells: BTreeMap<String, String>,
    #[serde(default)]
    pub unschedulable: bool,
}

/// One resolved (space, Location, SyncTarget) destination
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SinglePlacement {
    /// Space identifier of the tenant owning the Location and SyncTarget
    pub cluster: String,
    pub location_name: String,
    pub sync_target_name: String,
    #[serde(rename = "syncTargetUID")]
    pub sync_target_uid: String,
}

impl SinglePlacement {
    /// True when both tuples name the same (space, Location, SyncTarget) triple
    pub fn same_destination(&self, other: &SinglePlacement) -> bool {
        self.cluster == other.cluster
            && self.location_name == other.location_name
            && self.sync_target_name == other.sync_target_name
    }
}

/// Resolved destinations of one EdgePlacement, named after it and owned by it.
///
/// The object carries `destinations` at the top level rather than under a
/// `spec`, so `Resource` is implemented by hand instead of derived.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SinglePlacementSlice {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub destinations: Vec<SinglePlacement>,
}

impl SinglePlacementSlice {
    /// Build a slice owned by `owner`, carrying `destinations`
    pub fn owned_by(owner: &EdgePlacement, destinations: Vec<SinglePlacement>) -> Self {
        let owner_ref = OwnerReference {
            api_version: EdgePlacement::api_version(&()).into_owned(),
            kind: EdgePlacement::kind(&()).into_owned(),
            name: owner.name_any(),
            uid: owner.uid().unwrap_or_default(),
            ..Default::default()
        };
        SinglePlacementSlice {
            api_version: Self::api_version(&()).into_owned(),
            kind: Self::kind(&()).into_owned(),
            metadata: ObjectMeta {
                name: Some(owner.name_any()),
                owner_references: Some(vec![owner_ref]),
                ..Default::default()
            },
            destinations,
        }
    }
}

impl Resource for SinglePlacementSlice {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "SinglePlacementSlice".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        GROUP.into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        VERSION.into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "singleplacementslices".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
