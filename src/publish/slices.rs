// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Editing the destination list of a slice.

use crate::error::{ResolverError, Result};
use crate::store::TenantName;
use crate::types::SinglePlacement;
use tracing::warn;

/// Remove every destination reached through the given Location
pub fn without_location(
    destinations: Vec<SinglePlacement>,
    location: &TenantName,
) -> Vec<SinglePlacement> {
    destinations
        .into_iter()
        .filter(|sp| sp.cluster != location.space || sp.location_name != location.name)
        .collect()
}

/// Remove every destination naming the given SyncTarget
pub fn without_sync_target(
    destinations: Vec<SinglePlacement>,
    sync_target: &TenantName,
) -> Vec<SinglePlacement> {
    destinations
        .into_iter()
        .filter(|sp| sp.cluster != sync_target.space || sp.sync_target_name != sync_target.name)
        .collect()
}

/// Append `fresh` to `destinations`, never producing two entries for the same triple.
///
/// Callers strip the subject's entries before extending, so a collision means
/// the index disagrees with the published slice. It is logged and the fresh
/// entry wins.
pub fn extend_unique(
    mut destinations: Vec<SinglePlacement>,
    fresh: impl IntoIterator<Item = SinglePlacement>,
) -> Vec<SinglePlacement> {
    for sp in fresh {
        match destinations.iter_mut().find(|d| d.same_destination(&sp)) {
            Some(existing) => {
                if *existing != sp {
                    warn!(
                        "{}",
                        ResolverError::IndexCorruption(format!(
                            "destination {}/{}/{} resolved twice with different ids",
                            sp.cluster, sp.location_name, sp.sync_target_name
                        ))
                    );
                }
                *existing = sp;
            }
            None => destinations.push(sp),
        }
    }
    destinations
}

/// Check that no two destinations share the same (space, Location, SyncTarget) triple
pub fn check_unique(destinations: &[SinglePlacement]) -> Result<()> {
    for (i, sp) in destinations.iter().enumerate() {
        if destinations[i + 1..].iter().any(|d| d.same_destination(sp)) {
            return Err(ResolverError::IndexCorruption(format!(
                "destination {}/{}/{} appears more than once",
                sp.cluster, sp.location_name, sp.sync_target_name
            )));
        }
    }
    Ok(())
}
