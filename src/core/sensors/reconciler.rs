//! Diffs one cycle's admitted series against the previous snapshot.
//!
//! Records are never removed: a series that disappears goes STALE and a
//! failed fetch turns every record UNAVAILABLE. Both keep the last known value
//! so a reappearing series is reported as UPDATED, never CREATED twice.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::model::{
    AdmittedSeries, Availability, CycleDiagnostics, CycleResult, FetchOutcome, Labels,
    SensorEvent, SensorRecord, SeriesIdentity, TargetSnapshot,
};

/// Result of reconciling one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub snapshot: TargetSnapshot,
    pub events: Vec<SensorEvent>,
}

/// Friendly sensor name: device name, metric name and labels in key order.
pub fn friendly_name(device_name: &str, metric_name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return format!("{} {}", device_name, metric_name);
    }
    let desc = labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {} ({})", device_name, metric_name, desc)
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn new_record(device_name: &str, admitted: AdmittedSeries) -> SensorRecord {
    let AdmittedSeries {
        identity,
        series,
        inference,
    } = admitted;

    SensorRecord {
        name: friendly_name(device_name, &series.metric_name, &series.labels),
        identity,
        metric_name: series.metric_name,
        value: series.value,
        labels: series.labels,
        unit: inference.unit,
        device_class: inference.device_class,
        state_class: inference.state_class,
        icon: inference.icon.map(str::to_string),
        last_seen: series.timestamp,
        availability: Availability::Available,
    }
}

/// Collapse series that share an identity. Keeps the position of the first
/// occurrence and the content of the last one.
fn dedupe(admitted: Vec<AdmittedSeries>) -> (Vec<AdmittedSeries>, Vec<SeriesIdentity>) {
    let mut ordered: Vec<AdmittedSeries> = Vec::with_capacity(admitted.len());
    let mut positions: HashMap<SeriesIdentity, usize> = HashMap::with_capacity(admitted.len());
    let mut collisions = Vec::new();

    for series in admitted {
        match positions.get(&series.identity) {
            Some(&index) => {
                log::warn!(
                    "Identity collision for {}: keeping the later series '{}'",
                    series.identity,
                    series.series.metric_name
                );
                if !collisions.contains(&series.identity) {
                    collisions.push(series.identity.clone());
                }
                ordered[index] = series;
            }
            None => {
                positions.insert(series.identity.clone(), ordered.len());
                ordered.push(series);
            }
        }
    }

    (ordered, collisions)
}

/// Merge a successful cycle's series into `records`. Returns the collided identities.
fn apply_series(
    previous: &TargetSnapshot,
    records: &mut BTreeMap<SeriesIdentity, SensorRecord>,
    admitted: Vec<AdmittedSeries>,
    events: &mut Vec<SensorEvent>,
) -> Vec<SeriesIdentity> {
    let (current, collisions) = dedupe(admitted);
    let mut seen = HashSet::with_capacity(current.len());

    for series in current {
        seen.insert(series.identity.clone());
        match records.get_mut(&series.identity) {
            Some(record) => {
                // Rebuilt in full: the device may have been renamed, and a
                // sanitisation collision may bring another raw metric name.
                let updated = new_record(&previous.device.name, series);
                let changed = !same_value(record.value, updated.value)
                    || record.availability != updated.availability
                    || record.name != updated.name
                    || record.metric_name != updated.metric_name;
                *record = updated;

                events.push(SensorEvent::Updated {
                    record: record.clone(),
                    changed,
                });
            }
            None => {
                let record = new_record(&previous.device.name, series);
                events.push(SensorEvent::Created(record.clone()));
                records.insert(record.identity.clone(), record);
            }
        }
    }

    for (identity, record) in records.iter_mut() {
        if seen.contains(identity) || record.availability == Availability::Stale {
            continue;
        }
        record.availability = Availability::Stale;
        events.push(SensorEvent::Stale(identity.clone()));
    }

    collisions
}

/// Produce the next snapshot and its change events.
///
/// `now` is the wall-clock time stamped on the new snapshot.
pub fn reconcile(previous: &TargetSnapshot, cycle: CycleResult, now: i64) -> Reconciliation {
    let mut records = previous.records.clone();
    let mut events = Vec::new();

    let CycleResult {
        outcome,
        admitted,
        rejected,
    } = cycle;

    let mut diagnostics = CycleDiagnostics {
        rejected,
        ..Default::default()
    };

    match &outcome {
        FetchOutcome::TransportError(reason) | FetchOutcome::ParseError(reason) => {
            for record in records.values_mut() {
                record.availability = Availability::Unavailable;
            }
            events.push(SensorEvent::Unavailable {
                reason: reason.clone(),
                affected: records.len(),
            });
        }
        FetchOutcome::Success { skipped } => {
            diagnostics.skipped = *skipped;
            diagnostics.collisions = apply_series(previous, &mut records, admitted, &mut events);
        }
        FetchOutcome::Pending => {
            diagnostics.collisions = apply_series(previous, &mut records, admitted, &mut events);
        }
    }

    let snapshot = TargetSnapshot {
        target: previous.target.clone(),
        device: previous.device.clone(),
        cycle: previous.cycle + 1,
        outcome,
        records,
        diagnostics,
        updated_at: now,
    };

    Reconciliation { snapshot, events }
}
