// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::{key_of, single_placement, WhereResolver};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::publish::{extend_unique, without_sync_target, DestinationWriter};
use crate::selectors::matches_optional;
use crate::store::{PlacementStore, SyncTargetKey};
use kube::ResourceExt;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

impl<W, I> WhereResolver<W, I>
where
    W: DestinationWriter,
    I: IdentityResolver,
{
    /// Bring every slice naming one SyncTarget up to date
    #[instrument(skip(self, store), fields(sync_target = %key.name))]
    pub(super) async fn reconcile_sync_target(
        &self,
        key: &SyncTargetKey,
        store: &mut PlacementStore,
    ) -> Result<()> {
        let previous = store.placements_using(key);

        let Some(st) = self.caches.sync_targets.get(key) else {
            let Some(name) = store.sync_target_name(key) else {
                debug!("SyncTarget deleted before it was ever resolved");
                store.drop_sync_target(key);
                return Ok(());
            };
            info!(
                "SyncTarget deleted, removing it from {} slices",
                previous.len()
            );
            for placement in &previous {
                self.rewrite_slice(placement, |d| without_sync_target(d, &name))
                    .await?;
            }
            store.drop_sync_target(key);
            return Ok(());
        };

        let name = self.tenant_name(st.as_ref())?;
        store.remember_sync_target(key.clone(), name.clone());

        let mut locations = Vec::new();
        for loc in self.caches.locations.state() {
            let loc_name = match self.tenant_name(loc.as_ref()) {
                Ok(loc_name) if loc_name.space == name.space => loc_name,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Skipping Location {}: {}", loc.name_any(), e);
                    continue;
                }
            };
            match matches_optional(loc.spec.instance_selector.as_ref(), st.labels()) {
                Ok(true) => {
                    store.remember_location(key_of(loc.as_ref()), loc_name.clone());
                    locations.push((key_of(loc.as_ref()), loc_name));
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping Location {}: {}", loc.name_any(), e),
            }
        }

        let current: HashSet<_> = locations
            .iter()
            .flat_map(|(loc_key, _)| store.placements_selecting(loc_key))
            .collect();

        debug!(
            previous = previous.len(),
            current = current.len(),
            locations = locations.len(),
            "Classified EdgePlacements"
        );

        for placement in previous.union(&current) {
            if current.contains(placement) {
                let mut destinations: Vec<_> = locations
                    .iter()
                    .filter(|(loc_key, _)| store.placements_selecting(loc_key).contains(placement))
                    .map(|(_, loc_name)| single_placement(loc_name, &name, &st))
                    .collect();
                destinations.sort();
                self.rewrite_slice(placement, |d| {
                    extend_unique(without_sync_target(d, &name), destinations)
                })
                .await?;
            } else {
                self.rewrite_slice(placement, |d| without_sync_target(d, &name))
                    .await?;
            }
        }

        store.set_locations_of_sync_target(
            key.clone(),
            locations.into_iter().map(|(loc_key, _)| loc_key).collect(),
        );

        Ok(())
    }
}
