// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Dispatching reconcile requests to a pool of workers.

use super::{ReconcileRequest, WhereResolver};
use crate::config::Config;
use crate::identity::IdentityResolver;
use crate::publish::DestinationWriter;
use crate::queue::WorkQueue;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Handle to send reconcile requests to the ResolverController
#[derive(Clone)]
pub struct ResolverHandle {
    placement_tx: mpsc::Sender<ReconcileRequest>,
    location_tx: mpsc::Sender<ReconcileRequest>,
    sync_target_tx: mpsc::Sender<ReconcileRequest>,
}

impl ResolverHandle {
    pub async fn send(&self, request: ReconcileRequest) {
        let tx = match request {
            ReconcileRequest::EdgePlacement(_) => &self.placement_tx,
            ReconcileRequest::Location(_) => &self.location_tx,
            ReconcileRequest::SyncTarget(_) => &self.sync_target_tx,
        };
        if let Err(e) = tx.send(request).await {
            error!("Failed to send reconcile request: {}", e);
        }
    }
}

/// Moves requests from the per-kind channels into one work queue and runs
/// the workers draining it.
pub struct ResolverController {
    config: Config,
    queue: Arc<WorkQueue<ReconcileRequest>>,
    receivers: Vec<mpsc::Receiver<ReconcileRequest>>,
}

impl ResolverController {
    pub fn new(config: Config) -> (Self, ResolverHandle) {
        let (placement_tx, placement_rx) = mpsc::channel(config.channel_capacity);
        let (location_tx, location_rx) = mpsc::channel(config.channel_capacity);
        let (sync_target_tx, sync_target_rx) = mpsc::channel(config.channel_capacity);

        let controller = Self {
            queue: WorkQueue::new(config.backoff()),
            receivers: vec![placement_rx, location_rx, sync_target_rx],
            config,
        };

        let handle = ResolverHandle {
            placement_tx,
            location_tx,
            sync_target_tx,
        };
        (controller, handle)
    }

    /// Process requests until `shutdown` completes, then drain the queue and stop.
    pub async fn run<W, I>(
        self,
        resolver: Arc<WhereResolver<W, I>>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()>
    where
        W: DestinationWriter + 'static,
        I: IdentityResolver + 'static,
    {
        let Self {
            config,
            queue,
            receivers,
        } = self;

        let pumps: Vec<_> = receivers
            .into_iter()
            .map(|rx| tokio::spawn(pump(rx, Arc::clone(&queue))))
            .collect();

        info!("Starting {} workers", config.workers);
        let workers: Vec<_> = (0..config.workers)
            .map(|id| tokio::spawn(worker(id, Arc::clone(&queue), Arc::clone(&resolver))))
            .collect();

        shutdown.await;

        info!("Shutting down, {} requests left to process", queue.len());
        for pump in pumps {
            pump.abort();
        }
        queue.shut_down();

        for handle in workers {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        info!("All workers stopped");
        Ok(())
    }
}

async fn pump(mut rx: mpsc::Receiver<ReconcileRequest>, queue: Arc<WorkQueue<ReconcileRequest>>) {
    while let Some(request) = rx.recv().await {
        queue.add(request);
    }
}

async fn worker<W, I>(
    id: usize,
    queue: Arc<WorkQueue<ReconcileRequest>>,
    resolver: Arc<WhereResolver<W, I>>,
) where
    W: DestinationWriter,
    I: IdentityResolver,
{
    while let Some(request) = queue.get().await {
        let span = info_span!(
            "reconcile",
            worker = id,
            triggering_kind = request.kind(),
            key = %request.name()
        );

        async {
            match resolver.process(&request).await {
                Ok(()) => {
                    debug!("Reconciled");
                    queue.forget(&request);
                }
                Err(e) => {
                    warn!(
                        requeues = queue.num_requeues(&request),
                        "Reconcile failed, retrying: {}", e
                    );
                    queue.add_rate_limited(request.clone());
                }
            }
        }
        .instrument(span)
        .await;

        queue.done(&request);
    }

    debug!(worker = id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KubeBindSpaceRelation;
    use crate::resolver::tests::{location, placement, sync_target, tuple, FakeWriter, Fixture};
    use kube::runtime::reflector::ObjectRef;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            workers: 2,
            retry_base_delay: Duration::from_millis(5),
            retry_max_delay: Duration::from_millis(50),
            ..Config::default()
        }
    }

    async fn run_until_quiet(
        resolver: Arc<WhereResolver<FakeWriter, KubeBindSpaceRelation>>,
        requests: Vec<ReconcileRequest>,
    ) {
        let (controller, handle) = ResolverController::new(test_config());
        for request in requests {
            handle.send(request).await;
        }
        controller
            .run(resolver, tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_requests_are_resolved_by_workers() {
        let mut fixture = Fixture::new();
        fixture.apply_location(location("l1", &[("region", "us")], &[("zone", "a")]));
        fixture.apply_sync_target(sync_target("s1", &[("zone", "a")]));
        fixture.apply_placement(placement("p1", &[&[("region", "us")]]));
        let resolver = Arc::new(fixture.resolver());

        run_until_quiet(
            Arc::clone(&resolver),
            vec![
                ReconcileRequest::EdgePlacement(ObjectRef::new(&fixture.provider_name("p1"))),
                ReconcileRequest::Location(ObjectRef::new(&fixture.provider_name("l1"))),
                ReconcileRequest::SyncTarget(ObjectRef::new(&fixture.provider_name("s1"))),
            ],
        )
        .await;

        assert_eq!(resolver.writer().slice("p1"), Some(vec![tuple("l1", "s1")]));
    }

    #[tokio::test]
    async fn test_failed_requests_are_retried() {
        let mut fixture = Fixture::new();
        fixture.apply_placement(placement("p1", &[&[("region", "us")]]));
        let resolver = Arc::new(fixture.resolver());
        resolver.writer().fail_next(2);

        run_until_quiet(
            Arc::clone(&resolver),
            vec![ReconcileRequest::EdgePlacement(ObjectRef::new(
                &fixture.provider_name("p1"),
            ))],
        )
        .await;

        assert_eq!(resolver.writer().slice("p1"), Some(vec![]));
    }

    #[tokio::test]
    async fn test_handle_send_after_shutdown_does_not_panic() {
        let (controller, handle) = ResolverController::new(test_config());
        drop(controller);
        handle
            .send(ReconcileRequest::Location(ObjectRef::new("l1")))
            .await;
    }
}
