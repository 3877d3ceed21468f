// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of EdgePlacements into SinglePlacementSlices.
//!
//! Each watched kind has its own reconcile path. A path reads the cached
//! objects, recomputes the selection relations touching its subject, tells
//! the [`PlacementStore`] what is now true and rewrites the slices of every
//! EdgePlacement whose destinations may have changed.

pub mod controller;
mod location;
mod placement;
mod sync_target;


pub use controller::{ResolverController, ResolverHandle};

use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::publish::{check_unique, extend_unique, DestinationWriter};
use crate::selectors::matches_optional;
use crate::store::{
    LocationKey, PlacementKey, PlacementStore, SharedStore, SyncTargetKey, TenantName,
};
use crate::types::{EdgePlacement, Location, SinglePlacement, SyncTarget};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of work: reconcile the object behind this key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReconcileRequest {
    EdgePlacement(PlacementKey),
    Location(LocationKey),
    SyncTarget(SyncTargetKey),
}

impl ReconcileRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileRequest::EdgePlacement(_) => "EdgePlacement",
            ReconcileRequest::Location(_) => "Location",
            ReconcileRequest::SyncTarget(_) => "SyncTarget",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ReconcileRequest::EdgePlacement(key) => &key.name,
            ReconcileRequest::Location(key) => &key.name,
            ReconcileRequest::SyncTarget(key) => &key.name,
        }
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

/// Local caches of the watched kinds
#[derive(Clone)]
pub struct Caches {
    pub placements: Store<EdgePlacement>,
    pub locations: Store<Location>,
    pub sync_targets: Store<SyncTarget>,
}

impl Caches {
    /// Wait until every cache has seen its initial listing
    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.placements.wait_until_ready().await?;
        self.locations.wait_until_ready().await?;
        self.sync_targets.wait_until_ready().await?;
        Ok(())
    }
}

pub struct WhereResolver<W, I> {
    caches: Caches,
    store: SharedStore,
    writer: W,
    identity: I,
}

impl<W, I> WhereResolver<W, I>
where
    W: DestinationWriter,
    I: IdentityResolver,
{
    pub fn new(caches: Caches, writer: W, identity: I) -> Self {
        Self {
            caches,
            store: PlacementStore::shared(),
            writer,
            identity,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Reconcile the object named by `request`.
    ///
    /// The store lock is held for the whole call, so reconciles never observe
    /// each other's partial updates.
    pub async fn process(&self, request: &ReconcileRequest) -> Result<()> {
        let mut store = self.store.lock().await;
        match request {
            ReconcileRequest::EdgePlacement(key) => self.reconcile_placement(key, &mut store).await,
            ReconcileRequest::Location(key) => self.reconcile_location(key, &mut store).await,
            ReconcileRequest::SyncTarget(key) => self.reconcile_sync_target(key, &mut store).await,
        }
    }

    /// Identity of a provider-side copy as seen in its tenant's space
    fn tenant_name<K: Resource>(&self, obj: &K) -> Result<TenantName> {
        let (owner, space) = self.identity.resolve_space(obj.meta())?;
        Ok(TenantName {
            space,
            name: owner.name,
        })
    }

    /// SyncTargets of the same tenant selected by `location`'s instance selector
    fn sync_targets_selected(
        &self,
        location: &Location,
        location_name: &TenantName,
    ) -> Result<Vec<(Arc<SyncTarget>, TenantName)>> {
        let selector = location.spec.instance_selector.as_ref();
        let mut selected = Vec::new();

        for st in self.caches.sync_targets.state() {
            let st_name = match self.tenant_name(st.as_ref()) {
                Ok(name) => name,
                Err(e) => {
                    debug!("Skipping SyncTarget {}: {}", st.name_any(), e);
                    continue;
                }
            };
            if st_name.space != location_name.space {
                continue;
            }
            if matches_optional(selector, st.labels())? {
                selected.push((st, st_name));
            }
        }

        Ok(selected)
    }

    /// Read the slice of `placement`, apply `edit` and write it back when it changed.
    ///
    /// EdgePlacements missing from the cache are skipped; their slice is
    /// removed along with them through its owner reference.
    async fn rewrite_slice(
        &self,
        placement: &PlacementKey,
        edit: impl FnOnce(Vec<SinglePlacement>) -> Vec<SinglePlacement> + Send,
    ) -> Result<()> {
        let Some(ep) = self.caches.placements.get(placement) else {
            debug!("EdgePlacement {} is gone, not rewriting its slice", placement.name);
            return Ok(());
        };
        let (owner, space) = self.identity.resolve_space(ep.meta())?;

        let current = self.writer.current(&space, &owner.name).await?;
        let updated = deduplicated(edit(current.clone().unwrap_or_default()));

        match current {
            None if updated.is_empty() => Ok(()),
            None => self.writer.create(&updated, &space, &owner.name).await,
            Some(existing) if existing == updated => {
                debug!("Slice of EdgePlacement {} is unchanged", owner.name);
                Ok(())
            }
            Some(_) => self.writer.update(&updated, &space, &owner.name).await,
        }
    }
}

fn single_placement(
    location: &TenantName,
    sync_target_name: &TenantName,
    sync_target: &SyncTarget,
) -> SinglePlacement {
    SinglePlacement {
        cluster: location.space.clone(),
        location_name: location.name.clone(),
        sync_target_name: sync_target_name.name.clone(),
        sync_target_uid: sync_target.uid().unwrap_or_default(),
    }
}

/// Drop repeated triples, logging the corruption that produced them
fn deduplicated(destinations: Vec<SinglePlacement>) -> Vec<SinglePlacement> {
    match check_unique(&destinations) {
        Ok(()) => destinations,
        Err(e) => {
            warn!("{}", e);
            extend_unique(Vec::new(), destinations)
        }
    }
}

fn key_of<K>(obj: &K) -> ObjectRef<K>
where
    K: Resource<DynamicType = ()>,
{
    ObjectRef::from_obj(obj)
}
