//! Equality label-selector matching.

use std::collections::BTreeMap;

use super::model::Labels;

/// Returns true when every `selector` pair exists in `labels` with an equal value.
///
/// Extra labels are ignored and an empty selector always matches.
pub fn matches(labels: &Labels, selector: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(key, expected)| labels.get(key).is_some_and(|actual| actual == expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        assert!(matches(&map(&[]), &map(&[])));
        assert!(matches(&map(&[("cpu", "0")]), &map(&[])));
    }

    #[test]
    fn test_extra_labels_ignored() {
        let labels = map(&[("cpu", "0"), ("mode", "idle"), ("instance", "a")]);
        assert!(matches(&labels, &map(&[("mode", "idle")])));
        assert!(matches(&labels, &map(&[("mode", "idle"), ("cpu", "0")])));
    }

    #[test]
    fn test_value_mismatch_or_missing_key() {
        let labels = map(&[("mode", "idle")]);
        assert!(!matches(&labels, &map(&[("mode", "user")])));
        assert!(!matches(&labels, &map(&[("cpu", "0")])));
        assert!(!matches(&map(&[]), &map(&[("mode", "")])));
    }

    #[test]
    fn test_empty_value_must_be_present() {
        assert!(matches(&map(&[("mode", "")]), &map(&[("mode", "")])));
    }
}
