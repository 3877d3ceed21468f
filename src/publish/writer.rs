// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Publishing resolved destinations into tenant spaces

use crate::constants::CONTROLLER_NAME;
use crate::error::{ResolverError, Result};
use crate::kubernetes::SpaceDirectory;
use crate::types::{EdgePlacement, SinglePlacement, SinglePlacementSlice};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use std::future::Future;
use tracing::{debug, info, instrument};

/// Reads and writes the SinglePlacementSlice of an EdgePlacement in its tenant's space
pub trait DestinationWriter: Send + Sync {
    /// Destinations currently published for EdgePlacement `name`, `None` if there is no slice
    fn current(
        &self,
        space_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Vec<SinglePlacement>>>> + Send;

    /// Create the slice of EdgePlacement `name`, owned by that EdgePlacement.
    /// A slice that already exists has its destinations replaced instead.
    fn create(
        &self,
        destinations: &[SinglePlacement],
        space_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replace the destinations of the existing slice of EdgePlacement `name`
    fn update(
        &self,
        destinations: &[SinglePlacement],
        space_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Writes slices through clients obtained from a [`SpaceDirectory`]
pub struct SliceWriter<D> {
    directory: D,
    provider_namespace: String,
}

impl<D: SpaceDirectory> SliceWriter<D> {
    pub fn new(directory: D, provider_namespace: impl Into<String>) -> Self {
        Self {
            directory,
            provider_namespace: provider_namespace.into(),
        }
    }

    async fn client(&self, space_id: &str) -> Result<Client> {
        self.directory
            .client_for(space_id, &self.provider_namespace)
            .await
    }
}

impl<D: SpaceDirectory> DestinationWriter for SliceWriter<D> {
    #[instrument(skip(self))]
    async fn current(&self, space_id: &str, name: &str) -> Result<Option<Vec<SinglePlacement>>> {
        let slices: Api<SinglePlacementSlice> = Api::all(self.client(space_id).await?);
        Ok(slices.get_opt(name).await?.map(|s| s.destinations))
    }

    #[instrument(skip(self, destinations), fields(destinations = destinations.len()))]
    async fn create(
        &self,
        destinations: &[SinglePlacement],
        space_id: &str,
        name: &str,
    ) -> Result<()> {
        let client = self.client(space_id).await?;
        let slices: Api<SinglePlacementSlice> = Api::all(client.clone());

        let placements: Api<EdgePlacement> = Api::all(client);
        let owner = match placements.get(name).await.map_err(ResolverError::from) {
            Ok(owner) => owner,
            Err(e) if e.is_not_found() => {
                return Err(ResolverError::OwnerNotFound(format!(
                    "EdgePlacement {} in space {}",
                    name, space_id
                )))
            }
            Err(e) => return Err(e),
        };

        let slice = SinglePlacementSlice::owned_by(&owner, destinations.to_vec());
        match slices.create(&PostParams::default(), &slice).await.map_err(ResolverError::from) {
            Ok(_) => {
                info!("Created SinglePlacementSlice {} in space {}", name, space_id);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("SinglePlacementSlice {} appeared concurrently, patching", name);
                patch_destinations(&slices, destinations, name).await
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, destinations), fields(destinations = destinations.len()))]
    async fn update(
        &self,
        destinations: &[SinglePlacement],
        space_id: &str,
        name: &str,
    ) -> Result<()> {
        let slices: Api<SinglePlacementSlice> = Api::all(self.client(space_id).await?);
        patch_destinations(&slices, destinations, name).await
    }
}

async fn patch_destinations(
    slices: &Api<SinglePlacementSlice>,
    destinations: &[SinglePlacement],
    name: &str,
) -> Result<()> {
    let patch = json!({ "destinations": destinations });
    let pp = PatchParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..Default::default()
    };
    slices.patch(name, &pp, &Patch::Merge(&patch)).await?;
    info!("Updated destinations of SinglePlacementSlice {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        already_exists_json, edge_path, edge_placement_json, not_found_json, slice_json,
        MockService,
    };

    struct FixedDirectory(Client);

    impl SpaceDirectory for FixedDirectory {
        async fn client_for(&self, _space_id: &str, _provider_namespace: &str) -> Result<Client> {
            Ok(self.0.clone())
        }
    }

    fn writer(mock: &MockService) -> SliceWriter<FixedDirectory> {
        SliceWriter::new(FixedDirectory(mock.clone().into_client()), "")
    }

    fn sp(loc: &str, st: &str) -> SinglePlacement {
        SinglePlacement {
            cluster: "space-a".to_string(),
            location_name: loc.to_string(),
            sync_target_name: st.to_string(),
            sync_target_uid: format!("uid-{}", st),
        }
    }

    #[tokio::test]
    async fn test_current_without_slice() {
        let mock = MockService::new();
        let got = writer(&mock).current("space-a", "ep1").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_current_reads_destinations() {
        let slice_path = edge_path("singleplacementslices", "ep1");
        let mock = MockService::new().on_get(&slice_path, 200, &slice_json("ep1", &[sp("l1", "s1")]));

        let got = writer(&mock).current("space-a", "ep1").await.unwrap();
        assert_eq!(got, Some(vec![sp("l1", "s1")]));
    }

    #[tokio::test]
    async fn test_create_owned_slice() {
        let slice_path = edge_path("singleplacementslices", "ep1");
        let mock = MockService::new()
            .on_get(&edge_path("edgeplacements", "ep1"), 200, &edge_placement_json("ep1", "uid-ep1"))
            .on_post(
                "/apis/edge.kubestellar.io/v2alpha1/singleplacementslices",
                201,
                &slice_json("ep1", &[sp("l1", "s1")]),
            );

        writer(&mock)
            .create(&[sp("l1", "s1")], "space-a", "ep1")
            .await
            .unwrap();

        let posts = mock.requests_with_method("POST");
        assert_eq!(posts.len(), 1);
        let body = &posts[0].body;
        assert_eq!(body["metadata"]["name"], "ep1");
        assert_eq!(body["metadata"]["ownerReferences"][0]["uid"], "uid-ep1");
        assert_eq!(body["metadata"]["ownerReferences"][0]["kind"], "EdgePlacement");
        assert_eq!(body["destinations"][0]["syncTargetUID"], "uid-s1");
        assert!(!mock
            .requests()
            .iter()
            .any(|r| r.path == slice_path));
    }

    #[tokio::test]
    async fn test_update_patches_existing_slice() {
        let slice_path = edge_path("singleplacementslices", "ep1");
        let mock = MockService::new()
            .on_patch(&slice_path, 200, &slice_json("ep1", &[sp("l1", "s1")]));

        writer(&mock)
            .update(&[sp("l1", "s1")], "space-a", "ep1")
            .await
            .unwrap();

        let patches = mock.requests_with_method("PATCH");
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0].body,
            json!({ "destinations": [{
                "cluster": "space-a",
                "locationName": "l1",
                "syncTargetName": "s1",
                "syncTargetUID": "uid-s1",
            }]})
        );
        assert!(mock.requests_with_method("POST").is_empty());
        assert!(mock.requests_with_method("GET").is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_slice_is_not_found() {
        let mock = MockService::new();

        let err = writer(&mock)
            .update(&[sp("l1", "s1")], "space-a", "ep1")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    #[tokio::test]
    async fn test_create_without_owner() {
        let mock = MockService::new().on_get(
            &edge_path("edgeplacements", "ep1"),
            404,
            &not_found_json("edgeplacements", "ep1"),
        );

        let err = writer(&mock)
            .create(&[sp("l1", "s1")], "space-a", "ep1")
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::OwnerNotFound(_)));
        assert!(mock.requests_with_method("POST").is_empty());
    }

    #[tokio::test]
    async fn test_create_falls_back_to_patch_on_conflict() {
        let slice_path = edge_path("singleplacementslices", "ep1");
        let mock = MockService::new()
            .on_get(&edge_path("edgeplacements", "ep1"), 200, &edge_placement_json("ep1", "uid-ep1"))
            .on_post(
                "/apis/edge.kubestellar.io/v2alpha1/singleplacementslices",
                409,
                &already_exists_json("singleplacementslices", "ep1"),
            )
            .on_patch(&slice_path, 200, &slice_json("ep1", &[sp("l1", "s1")]));

        writer(&mock)
            .create(&[sp("l1", "s1")], "space-a", "ep1")
            .await
            .unwrap();

        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }
}
