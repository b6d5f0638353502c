use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::inference::{DeviceClass, Inference, StateClass, Unit};
use crate::core::config::DeviceInfo;

/// Label set of a series, ordered by key
pub type Labels = BTreeMap<String, String>;

/// One fetched observation. Produced fresh every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub metric_name: String,
    pub labels: Labels,
    pub value: f64,
    /// Sample timestamp reported by the server (Unix seconds)
    pub timestamp: f64,
}

/// A series that passed the target's filter, with its identity and typing resolved
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittedSeries {
    pub identity: SeriesIdentity,
    pub series: RawSeries,
    pub inference: Inference,
}

/// Everything one poll cycle produced, ready for reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub outcome: FetchOutcome,
    /// Admitted series in fetched order
    pub admitted: Vec<AdmittedSeries>,
    /// Series dropped by the filter pipeline
    pub rejected: usize,
}

impl CycleResult {
    pub fn failed(outcome: FetchOutcome) -> Self {
        Self {
            outcome,
            admitted: Vec::new(),
            rejected: 0,
        }
    }
}

/// Restart-stable key correlating a series across polling cycles
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesIdentity(String);

impl SeriesIdentity {
    pub(crate) fn from_key(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Stale,
    Unavailable,
}

/// The durable logical entity tracked for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub identity: SeriesIdentity,
    pub metric_name: String,
    /// Friendly name, e.g. `My Server node_load1`
    pub name: String,
    pub value: f64,
    pub labels: Labels,
    pub unit: Option<Unit>,
    pub device_class: Option<DeviceClass>,
    pub state_class: StateClass,
    pub icon: Option<String>,
    /// Server timestamp of the last sample this record saw
    pub last_seen: f64,
    pub availability: Availability,
}

impl SensorRecord {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    /// Extra state attributes exposed alongside the value.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.labels.clone();
        attrs.insert("prometheus_metric_name".to_string(), self.metric_name.clone());
        attrs.insert("prometheus_metric_key".to_string(), self.identity.to_string());
        attrs.insert("last_synced_timestamp".to_string(), self.last_seen.to_string());
        attrs
    }
}

/// How the most recent fetch of a target went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FetchOutcome {
    /// No cycle has run yet
    Pending,
    Success {
        /// Malformed entries dropped while parsing
        skipped: usize,
    },
    TransportError(String),
    ParseError(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FetchOutcome::TransportError(_) | FetchOutcome::ParseError(_)
        )
    }
}

/// Per-cycle counters surfaced alongside the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDiagnostics {
    /// Malformed entries dropped by the parser
    pub skipped: usize,
    /// Series rejected by the filter pipeline
    pub rejected: usize,
    /// Identities that more than one series resolved to in this cycle
    pub collisions: Vec<SeriesIdentity>,
}

/// Full sensor state of one target at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub target: String,
    pub device: DeviceInfo,
    /// Number of completed poll cycles
    pub cycle: u64,
    pub outcome: FetchOutcome,
    pub records: BTreeMap<SeriesIdentity, SensorRecord>,
    pub diagnostics: CycleDiagnostics,
    /// Wall-clock time the snapshot was produced (Unix seconds)
    pub updated_at: i64,
}

impl TargetSnapshot {
    pub fn empty(target: &str, device: DeviceInfo) -> Self {
        Self {
            target: target.to_string(),
            device,
            cycle: 0,
            outcome: FetchOutcome::Pending,
            records: BTreeMap::new(),
            diagnostics: CycleDiagnostics::default(),
            updated_at: 0,
        }
    }

    pub fn get(&self, identity: &SeriesIdentity) -> Option<&SensorRecord> {
        self.records.get(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, availability: Availability) -> usize {
        self.records
            .values()
            .filter(|r| r.availability == availability)
            .count()
    }
}

/// Change emitted by the reconciler for the external entity layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorEvent {
    /// Identity seen for the first time
    Created(SensorRecord),
    /// Identity seen again; `changed` is false when value and labels are identical
    Updated { record: SensorRecord, changed: bool },
    /// Identity present before but missing from a successful fetch
    Stale(SeriesIdentity),
    /// Fetch failed; applies to every record of the target
    Unavailable { reason: String, affected: usize },
}

impl SensorEvent {
    pub fn identity(&self) -> Option<&SeriesIdentity> {
        match self {
            SensorEvent::Created(record) | SensorEvent::Updated { record, .. } => Some(&record.identity),
            SensorEvent::Stale(identity) => Some(identity),
            SensorEvent::Unavailable { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SensorEvent::Created(_) => "created",
            SensorEvent::Updated { .. } => "updated",
            SensorEvent::Stale(_) => "stale",
            SensorEvent::Unavailable { .. } => "unavailable",
        }
    }
}

/// Events of one completed cycle for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub target: String,
    pub cycle: u64,
    pub events: Vec<SensorEvent>,
}
