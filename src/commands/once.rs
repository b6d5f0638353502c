use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::*;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::config::ProviderConfig;
use crate::core::sensors::{Coordinator, PrometheusClient, TargetPoller, TargetSnapshot, Transport};
use crate::ui::print_snapshot;

/// Run a single cycle for every valid target and print the snapshots.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = super::load_config(matches)?;
    let json = matches.get_flag("json");

    for error in &config.errors {
        eprintln!("{} {}", "Skipping".yellow(), error);
    }
    if config.targets.is_empty() {
        println!("{}", "No valid targets configured".yellow().bold());
        return Ok(());
    }

    let runtime = super::build_runtime()?;
    let snapshots = runtime.block_on(async {
        let transport = Arc::new(PrometheusClient::new()?);
        anyhow::Ok(poll_all(&config, transport).await)
    })?;

    if json {
        let out = serde_json::to_string_pretty(&snapshots).context("Failed to serialize snapshots")?;
        println!("{}", out);
    } else {
        for snapshot in &snapshots {
            print_snapshot(snapshot);
        }
    }
    Ok(())
}

/// One cycle per target, all targets concurrently.
pub async fn poll_all<T: Transport>(config: &ProviderConfig, transport: Arc<T>) -> Vec<TargetSnapshot> {
    let cycles = config.targets.iter().map(|target| {
        let poller = TargetPoller::new(
            Arc::new(target.clone()),
            &config.prometheus_url,
            transport.clone(),
            config.fetch_timeout(),
        );
        let (events_tx, _) = broadcast::channel(1);
        let (mut coordinator, _) = Coordinator::new(poller, config.interval_for(target), events_tx);
        async move {
            coordinator.run_cycle().await;
            coordinator.snapshot().clone()
        }
    });

    join_all(cycles).await
}
