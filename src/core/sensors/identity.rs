//! Deterministic identity assignment for metric series.
//!
//! An identity is a pure function of (device id, metric name, label set): no
//! counters, no randomness, no clock. Restarting the process reproduces the
//! exact same identities without any persisted table.
//!
//! Sanitisation collapses every run of non-alphanumeric characters, so
//! `cpu-usage` and `cpu_usage` map to the same identity. Such collisions are
//! resolved by the reconciler (last series in a cycle wins).

use super::model::SeriesIdentity;

const PART_SEPARATOR: char = ':';
const LABEL_SEPARATOR: char = ',';

/// Lowercase a metric name and collapse non-alphanumeric runs into `_`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Escape the characters that structure the serialized label list.
fn escape_into(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if matches!(ch, '\\' | '=' | ',') {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Serialize labels as `key=value` pairs sorted by key.
pub fn serialize_labels<I, K, V>(labels: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = labels.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut out = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(LABEL_SEPARATOR);
        }
        escape_into(&mut out, key.as_ref());
        out.push('=');
        escape_into(&mut out, value.as_ref());
    }
    out
}

/// Compute the identity of a series.
///
/// Label order is irrelevant; a difference in any single label value yields a
/// different identity.
pub fn assign<I, K, V>(device_id: &str, metric_name: &str, labels: I) -> SeriesIdentity
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut key = String::with_capacity(device_id.len() + metric_name.len() + 32);
    key.push_str(device_id);
    key.push(PART_SEPARATOR);
    key.push_str(&sanitize(metric_name));
    key.push(PART_SEPARATOR);
    key.push_str(&serialize_labels(labels));
    SeriesIdentity::from_key(key)
}
