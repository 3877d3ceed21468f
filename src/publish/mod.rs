// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Publishing resolved destinations into SinglePlacementSlices.

pub mod slices;
pub mod writer;

pub use slices::{check_unique, extend_unique, without_location, without_sync_target};
pub use writer::{DestinationWriter, SliceWriter};
