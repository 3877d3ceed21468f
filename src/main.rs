// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use where_resolver::config::Config;
use where_resolver::constants::CONTROLLER_NAME;
use where_resolver::identity::KubeBindSpaceRelation;
use where_resolver::kubernetes::{wait_for_edge_crds, SpaceClients};
use where_resolver::publish::SliceWriter;
use where_resolver::resolver::{Caches, ResolverController, WhereResolver};
use where_resolver::types::{EdgePlacement, Location, SyncTarget};
use where_resolver::watch::reflect;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run().instrument(info_span!("controller", name = CONTROLLER_NAME)).await
}

async fn run() -> Result<()> {
    info!("Starting where-resolver");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: workers={}, space_provider_namespace={}, kube_bind_namespace={}",
        config.workers, config.space_provider_namespace, config.kube_bind_namespace
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Wait for the edge CRDs before starting watches
    info!("Waiting for edge CRDs to become available...");
    wait_for_edge_crds(&client).await?;

    // Keep the kube-bind space relation up to date
    let relation = KubeBindSpaceRelation::new();
    let relation_task = tokio::spawn(
        relation
            .clone()
            .run(client.clone(), config.kube_bind_namespace.clone())
            .in_current_span(),
    );

    let (controller, handle) = ResolverController::new(config.clone());

    let (placements, placement_feed) = reflect::<EdgePlacement>(Api::all(client.clone()), handle.clone());
    let (locations, location_feed) = reflect::<Location>(Api::all(client.clone()), handle.clone());
    let (sync_targets, sync_target_feed) = reflect::<SyncTarget>(Api::all(client.clone()), handle);
    let feeds = [
        tokio::spawn(placement_feed.in_current_span()),
        tokio::spawn(location_feed.in_current_span()),
        tokio::spawn(sync_target_feed.in_current_span()),
    ];

    let caches = Caches {
        placements,
        locations,
        sync_targets,
    };
    info!("Waiting for caches to sync...");
    caches.wait_until_ready().await?;
    info!("Caches synced");

    let writer = SliceWriter::new(
        SpaceClients::new(client.clone()),
        config.space_provider_namespace.clone(),
    );
    let resolver = Arc::new(WhereResolver::new(caches, writer, relation));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    controller.run(resolver, shutdown).await?;

    for feed in feeds {
        feed.abort();
    }
    relation_task.abort();

    warn!("where-resolver stopped");
    Ok(())
}
