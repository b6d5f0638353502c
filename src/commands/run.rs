use anyhow::Result;
use clap::ArgMatches;
use colored::*;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::core::sensors::{PrometheusClient, SensorEvent, SensorRuntime};
use crate::ui::{format_event, print_snapshot};

/// Poll every valid target until Ctrl+C, printing change events.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = super::load_config(matches)?;
    let all_events = matches.get_flag("all-events");

    for error in &config.errors {
        eprintln!("{} {}", "Skipping".yellow(), error);
    }
    if config.targets.is_empty() {
        println!("{}", "No valid targets configured".yellow().bold());
        return Ok(());
    }

    let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Stopping...".yellow().bold());
        let _ = stop_tx.send(());
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let runtime = super::build_runtime()?;
    runtime.block_on(async {
        let transport = Arc::new(PrometheusClient::new()?);
        let sensors = SensorRuntime::start(&config, transport);
        let mut events = sensors.subscribe();

        println!(
            "{} {}",
            format!("Polling {} target(s) at {}", config.targets.len(), config.prometheus_url)
                .cyan()
                .bold(),
            "(Ctrl+C to stop)".dimmed()
        );

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(batch) => {
                        for event in &batch.events {
                            if all_events || is_change(event) {
                                println!("{}", format_event(&batch.target, event));
                            }
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Event stream lagged, {} batches dropped", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop_rx.recv() => break,
            }
        }

        let finals = sensors.shutdown().await;
        for snapshot in finals.values() {
            print_snapshot(snapshot);
        }
        anyhow::Ok(())
    })
}

fn is_change(event: &SensorEvent) -> bool {
    !matches!(event, SensorEvent::Updated { changed: false, .. })
}
