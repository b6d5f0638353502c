use prom_sensors::commands::once::poll_all;
use prom_sensors::core::config::{ProviderConfig, TargetConfig};
use prom_sensors::core::sensors::model::{Availability, FetchOutcome, RawSeries};
use prom_sensors::core::sensors::{
    FetchRequest, FetchedBatch, ScriptedResponse, ScriptedTransport, SensorRuntime, Transport,
};
use prom_sensors::{Result, SensorError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Routes each request to the script of its instance
struct PerInstance {
    scripts: HashMap<String, ScriptedTransport>,
}

impl Transport for PerInstance {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBatch> {
        match self.scripts.get(&request.instance_value) {
            Some(script) => script.fetch(request).await,
            None => Err(SensorError::transport("no route")),
        }
    }
}

fn series(name: &str) -> RawSeries {
    RawSeries {
        metric_name: name.to_string(),
        labels: Default::default(),
        value: 1.0,
        timestamp: 0.0,
    }
}

fn batch(names: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Batch(FetchedBatch {
        series: names.iter().map(|n| series(n)).collect(),
        skipped: 0,
    })
}

fn config(targets: &[&str]) -> ProviderConfig {
    ProviderConfig {
        prometheus_url: "http://prom:9090".to_string(),
        scrape_interval: 60,
        fetch_timeout: 1,
        targets: targets
            .iter()
            .map(|t| TargetConfig::new(t, "node", "instance", t, t, t))
            .collect(),
        errors: Vec::new(),
    }
}

#[tokio::test]
async fn test_poll_all_targets_independent() {
    let transport = PerInstance {
        scripts: HashMap::from([
            ("up".to_string(), ScriptedTransport::new([batch(&["a", "b"])])),
            (
                "down".to_string(),
                ScriptedTransport::new([ScriptedResponse::TransportError("refused".into())]),
            ),
        ]),
    };

    let snapshots = poll_all(&config(&["up", "down"]), Arc::new(transport)).await;
    assert_eq!(snapshots.len(), 2);

    assert_eq!(snapshots[0].target, "up");
    assert_eq!(snapshots[0].len(), 2);
    assert!(snapshots[0].outcome.is_success());

    assert_eq!(snapshots[1].target, "down");
    assert!(snapshots[1].is_empty());
    assert!(matches!(snapshots[1].outcome, FetchOutcome::TransportError(_)));
}

#[tokio::test]
async fn test_hanging_target_does_not_block_others() {
    let transport = PerInstance {
        scripts: HashMap::from([
            ("fast".to_string(), ScriptedTransport::new([batch(&["up"])])),
            ("stuck".to_string(), ScriptedTransport::new([ScriptedResponse::Hang])),
        ]),
    };
    let mut config = config(&["fast", "stuck"]);
    config.fetch_timeout = 30;

    let runtime = SensorRuntime::start(&config, Arc::new(transport));
    let mut fast = runtime.watch("fast").unwrap();
    while fast.borrow_and_update().cycle < 1 {
        fast.changed().await.unwrap();
    }

    assert_eq!(runtime.snapshot("stuck").unwrap().cycle, 0);

    let finals = tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .unwrap();
    assert_eq!(finals["fast"].cycle, 1);
    assert_eq!(finals["stuck"].cycle, 0);
    assert_eq!(finals["stuck"].outcome, FetchOutcome::Pending);
}

#[tokio::test]
async fn test_outage_and_recovery_through_runtime() {
    let script = ScriptedTransport::new([
        batch(&["a", "b", "c", "d", "e"]),
        ScriptedResponse::TransportError("connection reset".into()),
        batch(&["a", "b", "c", "d", "e"]),
    ]);
    let mut config = config(&["node"]);
    config.targets[0].scrape_interval = Some(1);

    let runtime = SensorRuntime::start(&config, Arc::new(script));
    let mut events = runtime.subscribe();

    let first = events.recv().await.unwrap();
    assert_eq!(first.events.len(), 5);
    assert!(first.events.iter().all(|e| e.kind() == "created"));

    let second = events.recv().await.unwrap();
    assert_eq!(second.events.len(), 1);
    assert_eq!(second.events[0].kind(), "unavailable");
    let during = runtime.snapshot("node").unwrap();
    assert_eq!(during.count(Availability::Unavailable), 5);

    let third = events.recv().await.unwrap();
    assert_eq!(third.events.len(), 5);
    assert!(third.events.iter().all(|e| e.kind() == "updated"));

    let finals = runtime.shutdown().await;
    assert_eq!(finals["node"].count(Availability::Available), 5);
}

#[tokio::test]
async fn test_stop_unknown_target() {
    let mut runtime = SensorRuntime::start(&config(&[]), Arc::new(ScriptedTransport::default()));
    assert!(matches!(
        runtime.stop_target("missing").await,
        Err(SensorError::UnknownTarget(_))
    ));
    assert!(runtime.shutdown().await.is_empty());
}
