//! Orchestration of all target coordinators.
//!
//! One task per target, each with its own shutdown channel. The transport is
//! the only thing the tasks share.

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::coordinator::Coordinator;
use super::model::{EventBatch, TargetSnapshot};
use super::poller::TargetPoller;
use super::transport::Transport;
use crate::core::config::{ProviderConfig, TargetConfig};
use crate::error::{Result, SensorError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to one running target loop
struct TargetHandle {
    config: Arc<TargetConfig>,
    /// Outlives restarts so receivers from [`SensorRuntime::watch`] stay connected
    snapshot_tx: watch::Sender<Arc<TargetSnapshot>>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<TargetSnapshot>,
}

impl TargetHandle {
    /// Stop the loop and wait for it. Falls back to the last published
    /// snapshot if the task panicked.
    async fn stop(self) -> TargetSnapshot {
        // Err only means the task already finished
        let _ = self.shutdown_tx.send(());
        match self.task.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Target '{}' task failed: {}", self.config.target_name, e);
                self.snapshot_tx.borrow().as_ref().clone()
            }
        }
    }
}

/// Runs every configured target concurrently.
///
/// Must be created inside a Tokio runtime.
pub struct SensorRuntime<T: Transport> {
    transport: Arc<T>,
    base_url: String,
    default_interval: u64,
    fetch_timeout: Duration,
    events_tx: broadcast::Sender<Arc<EventBatch>>,
    targets: BTreeMap<String, TargetHandle>,
}

impl<T: Transport> SensorRuntime<T> {
    pub fn new(transport: Arc<T>, base_url: &str, default_interval: u64, fetch_timeout: Duration) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            base_url: base_url.to_string(),
            default_interval,
            fetch_timeout,
            events_tx,
            targets: BTreeMap::new(),
        }
    }

    /// Create a runtime and start every valid target of `config`.
    pub fn start(config: &ProviderConfig, transport: Arc<T>) -> Self {
        let mut runtime = Self::new(
            transport,
            &config.prometheus_url,
            config.scrape_interval,
            config.fetch_timeout(),
        );

        for target in &config.targets {
            if let Err(e) = runtime.start_target(target.clone()) {
                log::error!("Could not start target '{}': {}", target.target_name, e);
            }
        }

        log::info!("Started {} target(s)", runtime.targets.len());
        runtime
    }

    /// Subscribe to the change events of every target.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventBatch>> {
        self.events_tx.subscribe()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    pub fn target_config(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name).map(|h| h.config.as_ref())
    }

    /// Latest published snapshot of a target.
    pub fn snapshot(&self, name: &str) -> Option<Arc<TargetSnapshot>> {
        self.targets.get(name).map(|h| h.snapshot_tx.borrow().clone())
    }

    /// Watch a target's snapshots.
    pub fn watch(&self, name: &str) -> Option<watch::Receiver<Arc<TargetSnapshot>>> {
        self.targets.get(name).map(|h| h.snapshot_tx.subscribe())
    }

    pub fn start_target(&mut self, target: TargetConfig) -> Result<()> {
        if self.targets.contains_key(&target.target_name) {
            return Err(SensorError::config(format!(
                "target '{}' is already running",
                target.target_name
            )));
        }
        self.spawn(target, None);
        Ok(())
    }

    /// Start a loop for `target`. With `snapshot_tx` the loop continues from
    /// that channel's current snapshot and publishes into it.
    fn spawn(&mut self, target: TargetConfig, snapshot_tx: Option<watch::Sender<Arc<TargetSnapshot>>>) {
        let config = Arc::new(target);
        let interval = config.poll_interval(self.default_interval);
        let poller = TargetPoller::new(
            config.clone(),
            &self.base_url,
            self.transport.clone(),
            self.fetch_timeout,
        );

        let coordinator = match snapshot_tx {
            Some(tx) => Coordinator::with_sender(poller, interval, tx, self.events_tx.clone()),
            None => Coordinator::new(poller, interval, self.events_tx.clone()).0,
        };
        let snapshot_tx = coordinator.sender();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(coordinator.run(shutdown_rx));

        self.targets.insert(
            config.target_name.clone(),
            TargetHandle {
                config,
                snapshot_tx,
                shutdown_tx,
                task,
            },
        );
    }

    /// Stop one target and return its final snapshot.
    pub async fn stop_target(&mut self, name: &str) -> Result<TargetSnapshot> {
        let handle = self
            .targets
            .remove(name)
            .ok_or_else(|| SensorError::unknown_target(name))?;
        Ok(handle.stop().await)
    }

    /// Apply a changed target configuration.
    ///
    /// Restart-on-change: the old loop is stopped and a new one continues on
    /// the same snapshot channel, so identities carry over and existing
    /// watchers see the new loop's cycles. Returns false when the
    /// configuration is unchanged.
    pub async fn reconfigure(&mut self, target: TargetConfig) -> Result<bool> {
        let name = target.target_name.clone();
        let unchanged = self
            .targets
            .get(&name)
            .map(|h| *h.config == target)
            .ok_or_else(|| SensorError::unknown_target(&name))?;
        if unchanged {
            return Ok(false);
        }

        let handle = self
            .targets
            .remove(&name)
            .ok_or_else(|| SensorError::unknown_target(&name))?;
        let snapshot_tx = handle.snapshot_tx.clone();
        let last = handle.stop().await;
        log::info!(
            "Restarting target '{}' with new configuration after {} cycles",
            name,
            last.cycle
        );
        self.spawn(target, Some(snapshot_tx));
        Ok(true)
    }

    /// Stop every target loop and return their final snapshots.
    pub async fn shutdown(self) -> BTreeMap<String, TargetSnapshot> {
        log::info!("Shutting down {} target(s)", self.targets.len());

        let (names, handles): (Vec<_>, Vec<_>) = self.targets.into_iter().unzip();
        let snapshots = join_all(handles.into_iter().map(TargetHandle::stop)).await;

        names.into_iter().zip(snapshots).collect()
    }
}
