// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{EDGE_GROUP, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS, REQUIRED_KINDS};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the edge CRDs to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_edge_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match served_edge_kinds(client).await {
            Ok(served) => {
                let missing = missing_kinds(&served);
                if missing.is_empty() {
                    info!("Edge CRDs ({}) are available", EDGE_GROUP);
                    return Ok(());
                }
                info!(
                    "Edge CRDs not yet available (missing: {}), waiting {} seconds...",
                    missing.join(", "),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for edge CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Kinds served in the edge API group
async fn served_edge_kinds(client: &Client) -> Result<HashSet<String>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[EDGE_GROUP])
        .run()
        .await?;

    Ok(discovery
        .groups()
        .filter(|g| g.name() == EDGE_GROUP)
        .flat_map(|g| g.recommended_resources())
        .map(|(ar, _)| ar.kind)
        .collect())
}

fn missing_kinds(served: &HashSet<String>) -> Vec<&'static str> {
    REQUIRED_KINDS
        .iter()
        .copied()
        .filter(|kind| !served.contains(*kind))
        .collect()
}
