//! Prometheus series to sensor records.
//!
//! Data flows one way per target: the [`transport`] fetches raw series, the
//! [`poller`] filters them and assigns identities, the [`reconciler`] diffs
//! them against the previous snapshot, and the [`coordinator`] publishes the
//! result. [`runtime`] runs one coordinator per configured target.

pub mod coordinator;
pub mod filter;
pub mod identity;
pub mod inference;
pub mod model;
pub mod poller;
pub mod reconciler;
pub mod runtime;
pub mod selector;
pub mod transport;

pub use coordinator::Coordinator;
pub use inference::{DeviceClass, Inference, StateClass, Unit};
pub use model::{
    Availability, EventBatch, FetchOutcome, Labels, RawSeries, SensorEvent, SensorRecord,
    SeriesIdentity, TargetSnapshot,
};
pub use poller::TargetPoller;
pub use runtime::SensorRuntime;
pub use transport::{FetchRequest, FetchedBatch, PrometheusClient, ScriptedResponse, ScriptedTransport, Transport};
