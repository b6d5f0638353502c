//! Fetching series from a Prometheus-compatible HTTP API.
//!
//! The core only depends on the [`Transport`] trait; [`PrometheusClient`] is
//! the production implementation and shares one connection pool across every
//! target.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::model::{Labels, RawSeries};
use crate::core::config::TargetConfig;
use crate::error::{Result, SensorError};

/// Everything needed to fetch the series of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub base_url: String,
    pub job_name: String,
    pub instance_label: String,
    pub instance_value: String,
    pub selector: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn for_target(base_url: &str, target: &TargetConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            job_name: target.job_name.clone(),
            instance_label: target.instance_label.clone(),
            instance_value: target.instance_value.clone(),
            selector: target.metrics_filter.clone(),
        }
    }

    /// Instant-vector selector, e.g. `{job="node",instance="host:9100"}`.
    pub fn promql(&self) -> String {
        let mut matchers = vec![
            format!("job=\"{}\"", escape_label_value(&self.job_name)),
            format!(
                "{}=\"{}\"",
                self.instance_label,
                escape_label_value(&self.instance_value)
            ),
        ];
        for (key, value) in &self.selector {
            matchers.push(format!("{}=\"{}\"", key, escape_label_value(value)));
        }
        format!("{{{}}}", matchers.join(","))
    }

    pub fn query_url(&self) -> String {
        format!("{}/api/v1/query", self.base_url)
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Parsed result of one fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBatch {
    pub series: Vec<RawSeries>,
    /// Malformed entries that were dropped
    pub skipped: usize,
}

/// Source of raw series for the pollers.
///
/// Implementations must be safe to share between all target loops.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<FetchedBatch>> + Send;
}

/// HTTP transport backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: reqwest::Client,
}

impl PrometheusClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("prom-sensors/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for PrometheusClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBatch> {
        let url = request.query_url();
        let query = request.promql();
        log::debug!("Querying Prometheus: {} query={}", url, query);

        let response = self
            .client
            .get(&url)
            .query(&[("query", query.as_str())])
            .send()
            .await
            .map_err(|e| SensorError::transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SensorError::transport(format!(
                "Prometheus API at {} returned status {}",
                url, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SensorError::parse(format!("invalid JSON body: {}", e)))?;

        parse_query_response(&body)
    }
}

/// One canned response of a [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    Batch(FetchedBatch),
    TransportError(String),
    ParseError(String),
    /// Never completes; exercises timeouts and cancellation
    Hang,
}

/// In-memory transport replaying a fixed script of responses.
///
/// Once the script is exhausted the last response repeats. Used for dry runs
/// and to drive coordinators without a Prometheus server.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedResponse>>,
    last: Mutex<Option<ScriptedResponse>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new<I: IntoIterator<Item = ScriptedResponse>>(script: I) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Delay every response by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.script.lock().push_back(response);
    }

    /// Number of fetches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> ScriptedResponse {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| ScriptedResponse::Batch(FetchedBatch::default())),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn fetch(&self, _request: &FetchRequest) -> Result<FetchedBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            ScriptedResponse::Batch(batch) => Ok(batch),
            ScriptedResponse::TransportError(msg) => Err(SensorError::transport(msg)),
            ScriptedResponse::ParseError(msg) => Err(SensorError::parse(msg)),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }
}

/// Parse a `/api/v1/query` response body.
///
/// A body that is not a successful vector result fails as a whole; individual
/// malformed entries are skipped and counted.
pub fn parse_query_response(body: &Value) -> Result<FetchedBatch> {
    match body.get("status").and_then(Value::as_str) {
        Some("success") => {}
        Some(_) => {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(SensorError::parse(format!("Prometheus API error: {}", reason)));
        }
        None => return Err(SensorError::parse("response has no status field")),
    }

    let results = body
        .get("data")
        .and_then(|d| d.get("result"))
        .and_then(Value::as_array)
        .ok_or_else(|| SensorError::parse("response has no data.result list"))?;

    let mut batch = FetchedBatch {
        series: Vec::with_capacity(results.len()),
        skipped: 0,
    };

    for item in results {
        match parse_sample(item) {
            Some(series) => batch.series.push(series),
            None => {
                log::debug!("Skipping malformed sample: {}", item);
                batch.skipped += 1;
            }
        }
    }

    Ok(batch)
}

/// One `{"metric": {...}, "value": [ts, "v"]}` element.
fn parse_sample(item: &Value) -> Option<RawSeries> {
    let metric = item.get("metric")?.as_object()?;

    let mut metric_name = None;
    let mut labels = Labels::new();
    for (key, value) in metric {
        let value = value.as_str()?;
        if key == "__name__" {
            metric_name = Some(value.to_string());
        } else {
            labels.insert(key.clone(), value.to_string());
        }
    }
    let metric_name = metric_name.filter(|n| !n.is_empty())?;

    let pair = item.get("value")?.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let timestamp = match &pair[0] {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    let value = parse_sample_value(pair[1].as_str()?)?;

    Some(RawSeries {
        metric_name,
        labels,
        value,
        timestamp,
    })
}

/// Prometheus encodes sample values as strings, including the special floats.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        _ => raw.trim().parse().ok(),
    }
}
