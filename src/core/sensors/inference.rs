//! Unit, device class and statistical class inference from metric names.
//!
//! Every category is resolved independently by walking an ordered rule table;
//! the first rule that matches the name and sets the category wins. Most
//! custom metrics match nothing, which leaves unit and device class unset.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Bytes,
    Seconds,
    Celsius,
    Fahrenheit,
    Percent,
    Ratio,
    Volts,
    Amperes,
    KilowattHours,
    Watts,
    Joules,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Bytes => "B",
            Unit::Seconds => "s",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Percent => "%",
            Unit::Ratio => "ratio",
            Unit::Volts => "V",
            Unit::Amperes => "A",
            Unit::KilowattHours => "kWh",
            Unit::Watts => "W",
            Unit::Joules => "J",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    DataSize,
    Duration,
    Temperature,
    Voltage,
    Current,
    Energy,
    Power,
}

/// Statistical class of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateClass {
    /// Gauge-like, fluctuates freely
    Instantaneous,
    /// Counter-like, monotonically increasing
    Cumulative,
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Suffix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Suffix(s) => name.ends_with(s),
            Pattern::Contains(s) => name.contains(s),
        }
    }
}

struct Rule {
    pattern: Pattern,
    unit: Option<Unit>,
    device_class: Option<DeviceClass>,
}

const fn rule(pattern: Pattern, unit: Option<Unit>, device_class: Option<DeviceClass>) -> Rule {
    Rule {
        pattern,
        unit,
        device_class,
    }
}

use DeviceClass as D;
use Pattern::{Contains, Suffix};

// Priority order matters: `node_cpu_seconds_total` must resolve to seconds
// even though it ends with `_total`.
const MEASUREMENT_RULES: &[Rule] = &[
    rule(Contains("_bytes"), Some(Unit::Bytes), Some(D::DataSize)),
    rule(Contains("_seconds"), Some(Unit::Seconds), Some(D::Duration)),
    rule(Contains("_celsius"), Some(Unit::Celsius), Some(D::Temperature)),
    rule(Contains("_fahrenheit"), Some(Unit::Fahrenheit), Some(D::Temperature)),
    rule(Contains("_percent"), Some(Unit::Percent), None),
    rule(Contains("_ratio"), Some(Unit::Ratio), None),
    rule(Contains("voltage"), Some(Unit::Volts), Some(D::Voltage)),
    rule(Contains("_volts"), Some(Unit::Volts), Some(D::Voltage)),
    // No bare "current" rule: it would type `current_connections` as amperes
    rule(Contains("_amperes"), Some(Unit::Amperes), Some(D::Current)),
    rule(Contains("_kwh"), Some(Unit::KilowattHours), Some(D::Energy)),
    rule(Contains("_watts"), Some(Unit::Watts), Some(D::Power)),
    rule(Contains("_joules"), Some(Unit::Joules), Some(D::Energy)),
];

const CUMULATIVE_PATTERNS: &[Pattern] = &[Contains("_total"), Suffix("_count")];

const ICON_RULES: &[(Pattern, &str)] = &[
    (Contains("cpu"), "mdi:cpu-64-bit"),
    (Contains("memory"), "mdi:memory"),
    (Contains("disk"), "mdi:harddisk"),
    (Contains("network"), "mdi:network-outline"),
    (Contains("process"), "mdi:cogs"),
];

const DEFAULT_ICON: &str = "mdi:chart-line";

/// Inferred typing of one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub unit: Option<Unit>,
    pub device_class: Option<DeviceClass>,
    pub state_class: StateClass,
    /// Only set when neither unit nor device class could be inferred
    pub icon: Option<&'static str>,
}

/// Derive unit, device class, state class and icon hint from a metric name.
pub fn infer(metric_name: &str) -> Inference {
    let mut unit = None;
    let mut device_class = None;

    for rule in MEASUREMENT_RULES {
        if unit.is_some() && device_class.is_some() {
            break;
        }
        if !rule.pattern.matches(metric_name) {
            continue;
        }
        unit = unit.or(rule.unit);
        device_class = device_class.or(rule.device_class);
    }

    let state_class = if CUMULATIVE_PATTERNS.iter().any(|p| p.matches(metric_name)) {
        StateClass::Cumulative
    } else {
        StateClass::Instantaneous
    };

    let icon = if unit.is_none() && device_class.is_none() {
        Some(
            ICON_RULES
                .iter()
                .find(|(p, _)| p.matches(metric_name))
                .map(|(_, icon)| *icon)
                .unwrap_or(DEFAULT_ICON),
        )
    } else {
        None
    };

    Inference {
        unit,
        device_class,
        state_class,
        icon,
    }
}
