// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::{key_of, single_placement, WhereResolver};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::publish::{extend_unique, without_location, DestinationWriter};
use crate::selectors::matches_any;
use crate::store::{LocationKey, PlacementStore};
use kube::ResourceExt;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

impl<W, I> WhereResolver<W, I>
where
    W: DestinationWriter,
    I: IdentityResolver,
{
    /// Bring every slice reaching through one Location up to date
    #[instrument(skip(self, store), fields(location = %key.name))]
    pub(super) async fn reconcile_location(
        &self,
        key: &LocationKey,
        store: &mut PlacementStore,
    ) -> Result<()> {
        let previous = store.placements_selecting(key);

        let Some(loc) = self.caches.locations.get(key) else {
            let Some(name) = store.location_name(key) else {
                debug!("Location deleted before it was ever resolved");
                store.drop_location(key);
                return Ok(());
            };
            info!(
                "Location deleted, removing it from {} slices",
                previous.len()
            );
            for placement in &previous {
                self.rewrite_slice(placement, |d| without_location(d, &name))
                    .await?;
            }
            store.drop_location(key);
            return Ok(());
        };

        // Names are kept before any write so a later delete can strip what was published
        let name = self.tenant_name(loc.as_ref())?;
        store.remember_location(key.clone(), name.clone());

        let mut current = HashSet::new();
        for ep in self.caches.placements.state() {
            match matches_any(&ep.spec.location_selectors, loc.labels()) {
                Ok(true) => {
                    current.insert(key_of(ep.as_ref()));
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping EdgePlacement {}: {}", ep.name_any(), e),
            }
        }

        let selected = self.sync_targets_selected(&loc, &name)?;
        for (st, st_name) in &selected {
            store.remember_sync_target(key_of(st.as_ref()), st_name.clone());
        }
        let mut destinations: Vec<_> = selected
            .iter()
            .map(|(st, st_name)| single_placement(&name, st_name, st))
            .collect();
        destinations.sort();

        debug!(
            previous = previous.len(),
            current = current.len(),
            sync_targets = selected.len(),
            "Classified EdgePlacements"
        );

        for placement in previous.union(&current) {
            if current.contains(placement) {
                self.rewrite_slice(placement, |d| {
                    extend_unique(without_location(d, &name), destinations.iter().cloned())
                })
                .await?;
            } else {
                self.rewrite_slice(placement, |d| without_location(d, &name))
                    .await?;
            }
        }

        let sync_targets: HashSet<_> = selected.iter().map(|(st, _)| key_of(st.as_ref())).collect();
        store.set_sync_targets_of_location(key, &sync_targets);
        store.set_placements_of_location(key.clone(), current);

        Ok(())
    }
}
