//! Per-target polling loop.
//!
//! Each coordinator exclusively owns its target's snapshot. Cycles never
//! overlap: cycle N is reconciled and published before cycle N+1 fetches.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};

use super::model::{CycleResult, EventBatch, SensorEvent, TargetSnapshot};
use super::poller::TargetPoller;
use super::reconciler::{reconcile, Reconciliation};
use super::transport::Transport;

pub struct Coordinator<T: Transport> {
    poller: TargetPoller<T>,
    interval: Duration,
    snapshot: TargetSnapshot,
    snapshot_tx: watch::Sender<Arc<TargetSnapshot>>,
    events_tx: broadcast::Sender<Arc<EventBatch>>,
}

impl<T: Transport> Coordinator<T> {
    /// Create a coordinator starting from an empty snapshot.
    pub fn new(
        poller: TargetPoller<T>,
        interval: Duration,
        events_tx: broadcast::Sender<Arc<EventBatch>>,
    ) -> (Self, watch::Receiver<Arc<TargetSnapshot>>) {
        let config = poller.config();
        let seed = TargetSnapshot::empty(&config.target_name, config.device.clone());
        Self::with_snapshot(poller, interval, seed, events_tx)
    }

    /// Create a coordinator that continues from an earlier snapshot of the
    /// same target, so known identities keep reporting UPDATED.
    pub fn with_snapshot(
        poller: TargetPoller<T>,
        interval: Duration,
        seed: TargetSnapshot,
        events_tx: broadcast::Sender<Arc<EventBatch>>,
    ) -> (Self, watch::Receiver<Arc<TargetSnapshot>>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(seed));
        (Self::with_sender(poller, interval, snapshot_tx, events_tx), snapshot_rx)
    }

    /// Take over an existing snapshot channel, continuing from its current
    /// value. Receivers handed out earlier keep observing the new loop.
    pub fn with_sender(
        poller: TargetPoller<T>,
        interval: Duration,
        snapshot_tx: watch::Sender<Arc<TargetSnapshot>>,
        events_tx: broadcast::Sender<Arc<EventBatch>>,
    ) -> Self {
        let mut seed = snapshot_tx.borrow().as_ref().clone();
        seed.device = poller.config().device.clone();
        snapshot_tx.send_replace(Arc::new(seed.clone()));

        Self {
            poller,
            interval,
            snapshot: seed,
            snapshot_tx,
            events_tx,
        }
    }

    pub fn snapshot(&self) -> &TargetSnapshot {
        &self.snapshot
    }

    /// Another handle on the channel this coordinator publishes to.
    pub fn sender(&self) -> watch::Sender<Arc<TargetSnapshot>> {
        self.snapshot_tx.clone()
    }

    pub fn target_name(&self) -> &str {
        &self.poller.config().target_name
    }

    /// Run one complete cycle: fetch, reconcile, publish.
    pub async fn run_cycle(&mut self) -> Arc<EventBatch> {
        let result = self.poller.poll_once().await;
        self.apply(result)
    }

    /// Reconcile a cycle result and publish the new snapshot and its events.
    pub fn apply(&mut self, result: CycleResult) -> Arc<EventBatch> {
        let Reconciliation { snapshot, events } =
            reconcile(&self.snapshot, result, chrono::Utc::now().timestamp());
        self.snapshot = snapshot;

        log_cycle(&self.snapshot, &events);

        // Publish even when nobody is watching yet; late subscribers read the latest value.
        self.snapshot_tx.send_replace(Arc::new(self.snapshot.clone()));

        let batch = Arc::new(EventBatch {
            target: self.snapshot.target.clone(),
            cycle: self.snapshot.cycle,
            events,
        });
        // broadcast::send only fails when there are no subscribers
        let _ = self.events_tx.send(batch.clone());
        batch
    }

    /// Poll on the configured interval until `shutdown` fires.
    ///
    /// An in-flight fetch is dropped on shutdown; the last published snapshot
    /// is left untouched and returned.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> TargetSnapshot {
        log::info!(
            "Target '{}' polling every {:?}",
            self.target_name(),
            self.interval
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }

            let result = tokio::select! {
                result = self.poller.poll_once() => result,
                _ = shutdown.recv() => {
                    log::debug!("Target '{}': abandoning in-flight fetch", self.target_name());
                    break;
                }
            };

            self.apply(result);
        }

        log::info!("Target '{}' stopped after {} cycles", self.target_name(), self.snapshot.cycle);
        self.snapshot
    }
}

fn log_cycle(snapshot: &TargetSnapshot, events: &[SensorEvent]) {
    let (mut created, mut updated, mut stale) = (0, 0, 0);
    for event in events {
        match event {
            SensorEvent::Created(_) => created += 1,
            SensorEvent::Updated { .. } => updated += 1,
            SensorEvent::Stale(_) => stale += 1,
            SensorEvent::Unavailable { reason, affected } => {
                log::warn!(
                    "Target '{}' cycle {}: {} sensors unavailable ({})",
                    snapshot.target,
                    snapshot.cycle,
                    affected,
                    reason
                );
            }
        }
    }

    log::debug!(
        "Target '{}' cycle {}: {} created, {} updated, {} stale, {} tracked",
        snapshot.target,
        snapshot.cycle,
        created,
        updated,
        stale,
        snapshot.len()
    );
}
