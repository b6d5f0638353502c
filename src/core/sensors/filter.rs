//! Per-target admission policy for fetched series.

use super::model::Labels;
use super::selector;
use crate::core::config::TargetConfig;

/// Why a series was kept out of a target's sensor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    NotIncluded,
    PrefixMismatch,
    SelectorMismatch,
}

/// Evaluate the filter rules in order; the first matching rule decides.
///
/// Exclusion is checked before anything else so it always wins over an
/// explicit include of the same metric.
pub fn evaluate(metric_name: &str, labels: &Labels, config: &TargetConfig) -> Result<(), Rejection> {
    if config.excluded_metrics.iter().any(|m| m == metric_name) {
        return Err(Rejection::Excluded);
    }

    if !config.included_metrics.is_empty()
        && !config.included_metrics.iter().any(|m| m == metric_name)
    {
        return Err(Rejection::NotIncluded);
    }

    if let Some(prefix) = &config.metrics_prefix {
        if !metric_name.starts_with(prefix.as_str()) {
            return Err(Rejection::PrefixMismatch);
        }
    }

    if !selector::matches(labels, &config.metrics_filter) {
        return Err(Rejection::SelectorMismatch);
    }

    Ok(())
}

/// Admit/reject decision for one series. Total: never fails.
pub fn admit(metric_name: &str, labels: &Labels, config: &TargetConfig) -> bool {
    evaluate(metric_name, labels, config).is_ok()
}
