//! Core data models for the autoscaler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upper CPU threshold (fraction of 1.0)
pub const DEFAULT_UPPER_CPU_THRESHOLD: f64 = 0.65;

/// Default lower CPU threshold (fraction of 1.0)
pub const DEFAULT_LOWER_CPU_THRESHOLD: f64 = 0.45;

/// A single raw statistic reported by the monitoring system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// The three independently sampled series one decision cycle consumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTelemetry {
    /// Request-volume sums per period
    pub request_volume: Vec<DataPoint>,
    /// In-service capacity averages per period
    pub capacity: Vec<DataPoint>,
    /// CPU utilization averages per period (0-100)
    pub cpu_utilization: Vec<DataPoint>,
}

/// Scaling action decided for a fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Stay,
    Grow,
    Shrink,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Stay => "Stay",
            Action::Grow => "Grow",
            Action::Shrink => "Shrink",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one decision cycle for one fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub current_capacity: i64,
    pub desired_capacity: i64,
    pub action: Action,
}

/// CPU thresholds as fractions of 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuThresholds {
    pub upper: f64,
    pub lower: f64,
}

impl CpuThresholds {
    pub fn new(upper: f64, lower: f64) -> Self {
        Self { upper, lower }
    }

    /// Arithmetic mean of the upper and lower thresholds
    pub fn middle(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            upper: DEFAULT_UPPER_CPU_THRESHOLD,
            lower: DEFAULT_LOWER_CPU_THRESHOLD,
        }
    }
}

/// Optional capacity clamps applied before an update is issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityBounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl CapacityBounds {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    /// Clamp a capacity into the configured bounds
    pub fn clamp(&self, capacity: i64) -> i64 {
        let lower = self.min.map_or(capacity, |min| capacity.max(min));
        self.max.map_or(lower, |max| lower.min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_threshold_is_mean() {
        let thresholds = CpuThresholds::new(0.65, 0.45);
        assert!((thresholds.middle() - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = CapacityBounds::new(Some(2), Some(10));
        assert_eq!(bounds.clamp(1), 2);
        assert_eq!(bounds.clamp(5), 5);
        assert_eq!(bounds.clamp(11), 10);
        assert_eq!(CapacityBounds::default().clamp(42), 42);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&Action::Shrink).unwrap();
        assert_eq!(json, "\"shrink\"");
        assert_eq!(Action::Grow.to_string(), "Grow");
    }
}
