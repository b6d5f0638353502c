//! Prometheus response body to sensor events, without any async machinery.

use prom_sensors::core::config::TargetConfig;
use prom_sensors::core::sensors::inference::{DeviceClass, StateClass, Unit};
use prom_sensors::core::sensors::model::{Availability, CycleResult, FetchOutcome, SensorEvent};
use prom_sensors::core::sensors::reconciler::reconcile;
use prom_sensors::core::sensors::transport::parse_query_response;
use prom_sensors::core::sensors::{ScriptedTransport, TargetPoller, TargetSnapshot};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn server() -> TargetConfig {
    TargetConfig {
        metrics_prefix: Some("node_".to_string()),
        ..TargetConfig::new("server", "node", "instance", "host:9100", "my_server", "My Server")
    }
}

fn poller(config: TargetConfig) -> TargetPoller<ScriptedTransport> {
    TargetPoller::new(
        Arc::new(config),
        "http://prom:9090",
        Arc::new(ScriptedTransport::default()),
        Duration::from_secs(1),
    )
}

fn body(samples: &[(Value, &str)]) -> Value {
    let result: Vec<Value> = samples
        .iter()
        .map(|(metric, value)| json!({"metric": metric, "value": [1700000000.0, value]}))
        .collect();
    json!({"status": "success", "data": {"resultType": "vector", "result": result}})
}

fn cycle(poller: &TargetPoller<ScriptedTransport>, samples: &[(Value, &str)]) -> CycleResult {
    poller.admit_batch(parse_query_response(&body(samples)).unwrap())
}

#[test]
fn test_cpu_counter_scenario() {
    let poller = poller(server());
    let empty = TargetSnapshot::empty("server", poller.config().device.clone());

    let first = cycle(
        &poller,
        &[
            (json!({"__name__": "node_cpu_seconds_total", "cpu": "0", "mode": "idle"}), "1234.5"),
            (json!({"__name__": "go_goroutines"}), "12"),
        ],
    );
    assert_eq!(first.rejected, 1);

    let next = reconcile(&empty, first, 100);
    assert_eq!(next.snapshot.len(), 1);

    let record = next.snapshot.records.values().next().unwrap();
    assert_eq!(
        record.identity.as_str(),
        "my_server:node_cpu_seconds_total:cpu=0,mode=idle"
    );
    assert_eq!(record.unit, Some(Unit::Seconds));
    assert_eq!(record.device_class, Some(DeviceClass::Duration));
    assert_eq!(record.state_class, StateClass::Cumulative);
    assert_eq!(record.name, "My Server node_cpu_seconds_total (cpu=0, mode=idle)");
    assert_eq!(record.attributes()["prometheus_metric_name"], "node_cpu_seconds_total");

    // Same series with the labels serialized in the other order
    let second = cycle(
        &poller,
        &[(json!({"mode": "idle", "__name__": "node_cpu_seconds_total", "cpu": "0"}), "1240")],
    );
    let after = reconcile(&next.snapshot, second, 160);
    assert_eq!(after.snapshot.len(), 1);
    assert!(matches!(
        after.events.as_slice(),
        [SensorEvent::Updated { changed: true, .. }]
    ));
}

#[test]
fn test_flapping_series_keeps_identity() {
    let poller = poller(server());
    let load = (json!({"__name__": "node_load1"}), "0.5");
    let memory = (json!({"__name__": "node_memory_free_bytes"}), "2048");

    let s0 = TargetSnapshot::empty("server", poller.config().device.clone());
    let s1 = reconcile(&s0, cycle(&poller, &[load.clone(), memory.clone()]), 1);
    let s2 = reconcile(&s1.snapshot, cycle(&poller, &[memory.clone()]), 2);
    let s3 = reconcile(&s2.snapshot, cycle(&poller, &[load.clone(), memory.clone()]), 3);

    let kinds = |events: &[SensorEvent]| events.iter().map(SensorEvent::kind).collect::<Vec<_>>();
    assert_eq!(kinds(&s1.events), vec!["created", "created"]);
    assert!(kinds(&s2.events).contains(&"stale"));
    assert!(!kinds(&s3.events).contains(&"created"));
    assert_eq!(s3.snapshot.count(Availability::Available), 2);
    assert_eq!(s3.snapshot.cycle, 3);
}

#[test]
fn test_error_body_marks_target_unavailable() {
    let poller = poller(server());
    let s0 = TargetSnapshot::empty("server", poller.config().device.clone());
    let s1 = reconcile(&s0, cycle(&poller, &[(json!({"__name__": "node_load1"}), "1")]), 1);

    let error = json!({"status": "error", "error": "query timed out"});
    let err = parse_query_response(&error).unwrap_err();
    let failed = CycleResult::failed(FetchOutcome::ParseError(err.to_string()));

    let s2 = reconcile(&s1.snapshot, failed, 2);
    assert_eq!(s2.snapshot.len(), 1);
    assert_eq!(s2.snapshot.count(Availability::Unavailable), 1);
    assert!(matches!(
        s2.events.as_slice(),
        [SensorEvent::Unavailable { affected: 1, .. }]
    ));
}

#[test]
fn test_skipped_samples_are_counted() {
    let poller = poller(server());
    let result = cycle(
        &poller,
        &[
            (json!({"__name__": "node_load1"}), "1"),
            (json!({"__name__": "node_load5"}), "garbage"),
            (json!({"job": "node"}), "1"),
        ],
    );

    assert_eq!(result.outcome, FetchOutcome::Success { skipped: 2 });
    assert_eq!(result.admitted.len(), 1);
}
