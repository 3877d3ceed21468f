// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and tenant space clients.

pub mod client;
pub mod crd;

pub use client::{SpaceClients, SpaceDirectory};
pub use crd::wait_for_edge_crds;
