//! Fetches one target and runs the result through the filter pipeline.

use std::sync::Arc;
use std::time::Duration;

use super::filter;
use super::identity;
use super::inference;
use super::model::{AdmittedSeries, CycleResult, FetchOutcome};
use super::transport::{FetchRequest, FetchedBatch, Transport};
use crate::core::config::TargetConfig;
use crate::error::SensorError;

/// Owns one target's configuration and turns fetches into cycle results.
///
/// Never fails: transport problems, timeouts and unparseable bodies all come
/// back as a failed [`CycleResult`] with no admitted series.
pub struct TargetPoller<T: Transport> {
    config: Arc<TargetConfig>,
    request: FetchRequest,
    transport: Arc<T>,
    timeout: Duration,
}

impl<T: Transport> TargetPoller<T> {
    pub fn new(config: Arc<TargetConfig>, base_url: &str, transport: Arc<T>, timeout: Duration) -> Self {
        let request = FetchRequest::for_target(base_url, &config);
        Self {
            config,
            request,
            transport,
            timeout,
        }
    }

    pub fn config(&self) -> &Arc<TargetConfig> {
        &self.config
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Fetch once, bounded by the per-cycle timeout.
    pub async fn poll_once(&self) -> CycleResult {
        let fetched = tokio::time::timeout(self.timeout, self.transport.fetch(&self.request)).await;

        match fetched {
            Ok(Ok(batch)) => self.admit_batch(batch),
            Ok(Err(e)) => {
                log::warn!("Fetch failed for target '{}': {}", self.config.target_name, e);
                CycleResult::failed(outcome_for(&e))
            }
            Err(_) => {
                let e = SensorError::Timeout(self.timeout);
                log::warn!("Fetch failed for target '{}': {}", self.config.target_name, e);
                CycleResult::failed(FetchOutcome::TransportError(e.to_string()))
            }
        }
    }

    /// Apply the filter pipeline, identity assignment and type inference.
    pub fn admit_batch(&self, batch: FetchedBatch) -> CycleResult {
        let mut admitted = Vec::with_capacity(batch.series.len());
        let mut rejected = 0;

        for series in batch.series {
            if !filter::admit(&series.metric_name, &series.labels, &self.config) {
                rejected += 1;
                continue;
            }

            admitted.push(AdmittedSeries {
                identity: identity::assign(&self.config.device.id, &series.metric_name, &series.labels),
                inference: inference::infer(&series.metric_name),
                series,
            });
        }

        if batch.skipped > 0 {
            log::warn!(
                "Target '{}': skipped {} malformed series",
                self.config.target_name,
                batch.skipped
            );
        }
        log::debug!(
            "Target '{}': admitted {} series, rejected {}",
            self.config.target_name,
            admitted.len(),
            rejected
        );

        CycleResult {
            outcome: FetchOutcome::Success {
                skipped: batch.skipped,
            },
            admitted,
            rejected,
        }
    }
}

fn outcome_for(error: &SensorError) -> FetchOutcome {
    if error.is_transport() {
        FetchOutcome::TransportError(error.to_string())
    } else {
        FetchOutcome::ParseError(error.to_string())
    }
}
