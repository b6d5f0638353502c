use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SCRAPE_INTERVAL: u64 = 60; // seconds
pub const DEFAULT_FETCH_TIMEOUT: u64 = 10; // seconds
pub const DEFAULT_MANUFACTURER: &str = "Prometheus";

/// Integration-level identifier, used for the hub device every target hangs off.
pub const DOMAIN: &str = "prometheus_provider";

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid slug regex"));

/// Prometheus label name syntax
static LABEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid label name regex"));

/// A configuration problem that only disqualifies a single target
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target #{index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("target '{target}': {reason}")]
    Invalid { target: String, reason: String },

    #[error("target '{target}': duplicate target name")]
    Duplicate { target: String },
}

impl ConfigError {
    /// Name of the offending target, when it could be read at all.
    pub fn target(&self) -> Option<&str> {
        match self {
            ConfigError::Malformed { .. } => None,
            ConfigError::Invalid { target, .. } | ConfigError::Duplicate { target } => Some(target),
        }
    }
}

/// Device the sensors of one target are grouped under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: Option<String>,
    /// Parent device: every target is linked to the integration hub.
    pub via_device: String,
}

impl DeviceInfo {
    pub fn new<S: Into<String>>(id: S, name: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            model: None,
            via_device: DOMAIN.to_string(),
        }
    }
}

/// Immutable configuration of a single scrape target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetConfig {
    pub target_name: String,
    pub job_name: String,
    pub instance_label: String,
    pub instance_value: String,
    pub device: DeviceInfo,
    pub metrics_prefix: Option<String>,
    pub included_metrics: Vec<String>,
    pub excluded_metrics: Vec<String>,
    pub metrics_filter: BTreeMap<String, String>,
    /// Per-target override of the global scrape interval, in seconds
    pub scrape_interval: Option<u64>,
}

impl TargetConfig {
    pub fn new(
        target_name: &str,
        job_name: &str,
        instance_label: &str,
        instance_value: &str,
        device_id: &str,
        device_name: &str,
    ) -> Self {
        Self {
            target_name: target_name.to_string(),
            job_name: job_name.to_string(),
            instance_label: instance_label.to_string(),
            instance_value: instance_value.to_string(),
            device: DeviceInfo::new(device_id, device_name),
            metrics_prefix: None,
            included_metrics: Vec::new(),
            excluded_metrics: Vec::new(),
            metrics_filter: BTreeMap::new(),
            scrape_interval: None,
        }
    }

    /// Effective poll interval: target override, then the global setting.
    pub fn poll_interval(&self, global_secs: u64) -> Duration {
        Duration::from_secs(self.scrape_interval.unwrap_or(global_secs))
    }
}

/// A single string is accepted where a list is expected
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Target entry exactly as written in the file, before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    target_name: String,
    job_name: String,
    instance_label: String,
    instance_value: String,
    device_id: String,
    device_name: String,
    #[serde(default)]
    device_manufacturer: Option<String>,
    #[serde(default)]
    device_model: Option<String>,
    #[serde(default)]
    metrics_prefix: Option<String>,
    #[serde(default)]
    included_metrics: Option<OneOrMany>,
    #[serde(default)]
    excluded_metrics: Option<OneOrMany>,
    #[serde(default)]
    metrics_filter: Option<Value>,
    #[serde(default)]
    scrape_interval: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    prometheus_url: String,
    #[serde(default)]
    scrape_interval: Option<Value>,
    #[serde(default)]
    fetch_timeout: Option<Value>,
    targets: Value,
}

/// Fully loaded provider configuration.
///
/// Targets that failed validation are kept aside in `errors`; they never
/// prevent the valid ones from being set up.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub prometheus_url: String,
    pub scrape_interval: u64,
    pub fetch_timeout: u64,
    pub targets: Vec<TargetConfig>,
    pub errors: Vec<ConfigError>,
}

impl ProviderConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json_str(&data).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Load configuration from the default location.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load(&path)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("prom-sensors").join("config.json"))
    }

    /// Parse configuration text.
    ///
    /// Only problems with the global keys are returned as an error; every
    /// target is validated on its own.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(data).context("Failed to parse config JSON")?;

        let prometheus_url = validate_url(&raw.prometheus_url)?;
        let scrape_interval = match raw.scrape_interval {
            Some(v) => positive_int(&v).map_err(|e| anyhow!("scrape_interval: {}", e))?,
            None => DEFAULT_SCRAPE_INTERVAL,
        };
        let fetch_timeout = match raw.fetch_timeout {
            Some(v) => positive_int(&v).map_err(|e| anyhow!("fetch_timeout: {}", e))?,
            None => DEFAULT_FETCH_TIMEOUT,
        };

        let entries = match raw.targets {
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            other => return Err(anyhow!("targets must be a list, got {}", other)),
        };

        let mut targets: Vec<TargetConfig> = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            match parse_target(index, entry) {
                Ok(target) => {
                    if !seen.insert(target.target_name.clone()) {
                        log::error!("Duplicate target name '{}' ignored", target.target_name);
                        errors.push(ConfigError::Duplicate {
                            target: target.target_name,
                        });
                        continue;
                    }
                    targets.push(target);
                }
                Err(e) => {
                    log::error!("Skipping target: {}", e);
                    errors.push(e);
                }
            }
        }

        Ok(Self {
            prometheus_url,
            scrape_interval,
            fetch_timeout,
            targets,
            errors,
        })
    }

    /// Poll interval the given target will actually run with.
    pub fn interval_for(&self, target: &TargetConfig) -> Duration {
        target.poll_interval(self.scrape_interval)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

fn validate_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid prometheus_url '{}'", raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        other => Err(anyhow!("prometheus_url must use http or https, got '{}'", other)),
    }
}

fn positive_int(value: &Value) -> std::result::Result<u64, String> {
    match value.as_u64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a positive integer, got {}", value)),
    }
}

fn parse_target(index: usize, entry: Value) -> std::result::Result<TargetConfig, ConfigError> {
    let raw: RawTarget = serde_json::from_value(entry).map_err(|e| ConfigError::Malformed {
        index,
        reason: e.to_string(),
    })?;

    let target = raw.target_name.clone();
    let invalid = |reason: String| ConfigError::Invalid {
        target: target.clone(),
        reason,
    };

    for (field, value) in [
        ("target_name", &raw.target_name),
        ("job_name", &raw.job_name),
        ("instance_label", &raw.instance_label),
        ("instance_value", &raw.instance_value),
        ("device_name", &raw.device_name),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("{} must not be empty", field)));
        }
    }

    if !SLUG_RE.is_match(&raw.device_id) {
        return Err(invalid(format!(
            "device_id '{}' is not a valid slug (lowercase letters, digits, underscores)",
            raw.device_id
        )));
    }

    if !LABEL_NAME_RE.is_match(&raw.instance_label) {
        return Err(invalid(format!(
            "instance_label '{}' is not a valid label name",
            raw.instance_label
        )));
    }

    let metrics_filter = match raw.metrics_filter {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => {
            let mut selector = BTreeMap::new();
            for (key, value) in map {
                if !LABEL_NAME_RE.is_match(&key) {
                    return Err(invalid(format!(
                        "metrics_filter key '{}' is not a valid label name",
                        key
                    )));
                }
                match value {
                    Value::String(s) => {
                        selector.insert(key, s);
                    }
                    other => {
                        return Err(invalid(format!(
                            "metrics_filter value for '{}' must be a string, got {}",
                            key, other
                        )))
                    }
                }
            }
            selector
        }
        Some(other) => {
            return Err(invalid(format!("metrics_filter must be a mapping, got {}", other)));
        }
    };

    let scrape_interval = match raw.scrape_interval {
        None | Some(Value::Null) => None,
        Some(v) => Some(positive_int(&v).map_err(|e| invalid(format!("scrape_interval: {}", e)))?),
    };

    Ok(TargetConfig {
        target_name: raw.target_name,
        job_name: raw.job_name,
        instance_label: raw.instance_label,
        instance_value: raw.instance_value,
        device: DeviceInfo {
            id: raw.device_id,
            name: raw.device_name,
            manufacturer: raw
                .device_manufacturer
                .unwrap_or_else(|| DEFAULT_MANUFACTURER.to_string()),
            model: raw.device_model,
            via_device: DOMAIN.to_string(),
        },
        metrics_prefix: raw.metrics_prefix.filter(|p| !p.is_empty()),
        included_metrics: raw.included_metrics.map(OneOrMany::into_vec).unwrap_or_default(),
        excluded_metrics: raw.excluded_metrics.map(OneOrMany::into_vec).unwrap_or_default(),
        metrics_filter,
        scrape_interval,
    })
}
