// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes object types read and written by the resolver.

pub mod edge;
pub mod space;

pub use edge::{
    EdgePlacement, EdgePlacementSpec, GroupVersionResource, Location, LocationSpec,
    SinglePlacement, SinglePlacementSlice, SyncTarget, SyncTargetSpec,
};
pub use space::{Space, SpaceSpec, SpaceStatus};
