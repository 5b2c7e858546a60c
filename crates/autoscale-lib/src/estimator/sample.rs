//! Per-timestamp telemetry sample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped observation of request volume, capacity and CPU
///
/// Derived values are plain float arithmetic. Zero capacity or CPU yields
/// an infinite efficiency, which consumers treat as unusable rather than
/// as an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Total requests observed in the period
    pub request_volume: f64,
    /// Average number of in-service compute units
    pub capacity: f64,
    /// Average CPU utilization, percent (0-100)
    pub cpu_utilization: f64,
}

impl Sample {
    /// Create an empty sample; fields are filled in while merging
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            request_volume: 0.0,
            capacity: 0.0,
            cpu_utilization: 0.0,
        }
    }

    pub fn with_values(
        timestamp: DateTime<Utc>,
        request_volume: f64,
        capacity: f64,
        cpu_utilization: f64,
    ) -> Self {
        Self {
            timestamp,
            request_volume,
            capacity,
            cpu_utilization,
        }
    }

    /// Requests served per unit of (capacity x CPU percent)
    pub fn efficiency(&self) -> f64 {
        self.request_volume / self.capacity / self.cpu_utilization
    }

    pub fn requests_per_unit(&self) -> f64 {
        self.request_volume / self.capacity
    }

    /// Capacity needed to run this sample's own load at `target_cpu`
    ///
    /// Uses the sample's own efficiency, so it reduces to
    /// `capacity * cpu_utilization / 100 / target_cpu`.
    pub fn required_capacity(&self, target_cpu: f64) -> f64 {
        self.request_volume / self.efficiency() / 100.0 / target_cpu
    }

    /// Capacity needed to run this sample's load at `target_cpu`, given an
    /// externally supplied efficiency
    pub fn estimated_required_capacity(&self, efficiency: f64, target_cpu: f64) -> f64 {
        self.request_volume / efficiency / 100.0 / target_cpu
    }

    /// CPU percent this sample's load implies at the given efficiency
    pub fn estimated_cpu_utilization(&self, efficiency: f64) -> f64 {
        self.request_volume / efficiency / self.capacity
    }
}
