// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::{deduplicated, key_of, single_placement, WhereResolver};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::publish::DestinationWriter;
use crate::selectors::matches_any;
use crate::store::{PlacementKey, PlacementStore};
use kube::{Resource, ResourceExt};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

impl<W, I> WhereResolver<W, I>
where
    W: DestinationWriter,
    I: IdentityResolver,
{
    /// Recompute the whole slice of one EdgePlacement
    #[instrument(skip(self, store), fields(placement = %key.name))]
    pub(super) async fn reconcile_placement(
        &self,
        key: &PlacementKey,
        store: &mut PlacementStore,
    ) -> Result<()> {
        let Some(ep) = self.caches.placements.get(key) else {
            debug!("EdgePlacement deleted, forgetting its selections");
            store.drop_placement(key);
            return Ok(());
        };
        let (owner, space) = self.identity.resolve_space(ep.meta())?;

        let mut locations = HashSet::new();
        let mut destinations = Vec::new();

        for loc in self.caches.locations.state() {
            if !matches_any(&ep.spec.location_selectors, loc.labels())? {
                continue;
            }
            let loc_key = key_of(loc.as_ref());
            locations.insert(loc_key.clone());

            let loc_name = match self.tenant_name(loc.as_ref()) {
                Ok(name) => name,
                Err(e) => {
                    debug!("Location {} not resolvable yet: {}", loc.name_any(), e);
                    continue;
                }
            };

            store.remember_location(loc_key.clone(), loc_name.clone());

            for st_key in store.sync_targets_selected_by(&loc_key) {
                let Some(st) = self.caches.sync_targets.get(&st_key) else {
                    continue;
                };
                let Ok(st_name) = self.tenant_name(st.as_ref()) else {
                    continue;
                };
                if st_name.space == loc_name.space {
                    destinations.push(single_placement(&loc_name, &st_name, &st));
                    store.remember_sync_target(st_key, st_name);
                }
            }
        }

        store.set_locations_of_placement(key, &locations);

        let mut destinations = deduplicated(destinations);
        destinations.sort();

        let current = self.writer.current(&space, &owner.name).await?;
        if current.as_ref() == Some(&destinations) {
            debug!("Slice is up to date");
            return Ok(());
        }

        info!(
            "Resolved {} destinations through {} locations",
            destinations.len(),
            locations.len()
        );
        match current {
            Some(_) => self.writer.update(&destinations, &space, &owner.name).await,
            None => self.writer.create(&destinations, &space, &owner.name).await,
        }
    }
}
