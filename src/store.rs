// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reverse index of the current selection relations.
//!
//! The store never evaluates selectors itself. Reconcilers compute the new
//! membership and tell the store what is true now; the store remembers it so
//! the next reconcile can tell who used to depend on a key.

use crate::types::{EdgePlacement, Location, SyncTarget};
use kube::runtime::reflector::ObjectRef;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type PlacementKey = ObjectRef<EdgePlacement>;
pub type LocationKey = ObjectRef<Location>;
pub type SyncTargetKey = ObjectRef<SyncTarget>;

/// Store shared by every worker; the lock is held for a whole reconcile
pub type SharedStore = Arc<Mutex<PlacementStore>>;

/// Where a Location or SyncTarget lives as seen by its tenant
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantName {
    /// Space identifier of the owning tenant
    pub space: String,
    /// Name in the tenant's own space
    pub name: String,
}

#[derive(Debug, Default)]
pub struct PlacementStore {
    /// EdgePlacements currently selecting each Location
    placements_by_location: HashMap<LocationKey, HashSet<PlacementKey>>,
    /// Locations currently selecting each SyncTarget
    locations_by_sync_target: HashMap<SyncTargetKey, HashSet<LocationKey>>,
    /// Last resolved tenant identity, kept so deletions can be cleaned up
    location_names: HashMap<LocationKey, TenantName>,
    sync_target_names: HashMap<SyncTargetKey, TenantName>,
}

impl PlacementStore {
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(PlacementStore::default()))
    }

    /// EdgePlacements currently selecting `location`
    pub fn placements_selecting(&self, location: &LocationKey) -> HashSet<PlacementKey> {
        self.placements_by_location
            .get(location)
            .cloned()
            .unwrap_or_default()
    }

    /// Locations currently selecting `sync_target`
    pub fn locations_selecting(&self, sync_target: &SyncTargetKey) -> HashSet<LocationKey> {
        self.locations_by_sync_target
            .get(sync_target)
            .cloned()
            .unwrap_or_default()
    }

    /// SyncTargets currently selected by `location`
    pub fn sync_targets_selected_by(&self, location: &LocationKey) -> Vec<SyncTargetKey> {
        self.locations_by_sync_target
            .iter()
            .filter(|(_, locations)| locations.contains(location))
            .map(|(st, _)| st.clone())
            .collect()
    }

    /// Union over every Location selecting `sync_target` of the EdgePlacements selecting that Location
    pub fn placements_using(&self, sync_target: &SyncTargetKey) -> HashSet<PlacementKey> {
        let Some(locations) = self.locations_by_sync_target.get(sync_target) else {
            return HashSet::new();
        };
        locations
            .iter()
            .filter_map(|loc| self.placements_by_location.get(loc))
            .flatten()
            .cloned()
            .collect()
    }

    /// Record the complete set of Locations selecting `sync_target`
    pub fn set_locations_of_sync_target(
        &mut self,
        sync_target: SyncTargetKey,
        locations: HashSet<LocationKey>,
    ) {
        if locations.is_empty() {
            self.locations_by_sync_target.remove(&sync_target);
        } else {
            self.locations_by_sync_target.insert(sync_target, locations);
        }
    }

    /// Record the complete set of SyncTargets selected by `location`, updating each SyncTarget's entry
    pub fn set_sync_targets_of_location(
        &mut self,
        location: &LocationKey,
        sync_targets: &HashSet<SyncTargetKey>,
    ) {
        for (st, locations) in self.locations_by_sync_target.iter_mut() {
            if !sync_targets.contains(st) {
                locations.remove(location);
            }
        }
        for st in sync_targets {
            self.locations_by_sync_target
                .entry(st.clone())
                .or_default()
                .insert(location.clone());
        }
        self.locations_by_sync_target.retain(|_, locs| !locs.is_empty());
    }

    /// Record the complete set of EdgePlacements selecting `location`
    pub fn set_placements_of_location(
        &mut self,
        location: LocationKey,
        placements: HashSet<PlacementKey>,
    ) {
        if placements.is_empty() {
            self.placements_by_location.remove(&location);
        } else {
            self.placements_by_location.insert(location, placements);
        }
    }

    /// Record the complete set of Locations selected by `placement`, updating each Location's entry
    pub fn set_locations_of_placement(
        &mut self,
        placement: &PlacementKey,
        locations: &HashSet<LocationKey>,
    ) {
        for (loc, placements) in self.placements_by_location.iter_mut() {
            if !locations.contains(loc) {
                placements.remove(placement);
            }
        }
        for loc in locations {
            self.placements_by_location
                .entry(loc.clone())
                .or_default()
                .insert(placement.clone());
        }
        self.placements_by_location.retain(|_, eps| !eps.is_empty());
    }

    /// Forget a deleted SyncTarget
    pub fn drop_sync_target(&mut self, sync_target: &SyncTargetKey) {
        self.locations_by_sync_target.remove(sync_target);
        self.sync_target_names.remove(sync_target);
    }

    /// Forget a deleted Location, including every SyncTarget's reference to it
    pub fn drop_location(&mut self, location: &LocationKey) {
        self.placements_by_location.remove(location);
        self.location_names.remove(location);
        for locations in self.locations_by_sync_target.values_mut() {
            locations.remove(location);
        }
        self.locations_by_sync_target.retain(|_, locs| !locs.is_empty());
    }

    /// Forget a deleted EdgePlacement from every Location's set
    pub fn drop_placement(&mut self, placement: &PlacementKey) {
        for placements in self.placements_by_location.values_mut() {
            placements.remove(placement);
        }
        self.placements_by_location.retain(|_, eps| !eps.is_empty());
    }

    pub fn remember_location(&mut self, location: LocationKey, name: TenantName) {
        self.location_names.insert(location, name);
    }

    pub fn remember_sync_target(&mut self, sync_target: SyncTargetKey, name: TenantName) {
        self.sync_target_names.insert(sync_target, name);
    }

    pub fn location_name(&self, location: &LocationKey) -> Option<TenantName> {
        self.location_names.get(location).cloned()
    }

    pub fn sync_target_name(&self, sync_target: &SyncTargetKey) -> Option<TenantName> {
        self.sync_target_names.get(sync_target).cloned()
    }
}
