//! Telemetry retrieval
//!
//! The estimation core consumes three raw series per fleet plus a peak-load
//! benchmark. This module defines the [`TelemetrySource`] boundary and the
//! fetch helpers that issue the independent reads concurrently.

mod snapshot;

#[cfg(feature = "aws")]
mod cloudwatch;

#[cfg(feature = "aws")]
pub use cloudwatch::{CloudWatchConfig, CloudWatchSource};
pub use snapshot::{capture_snapshot, GroupTelemetry, Snapshot, SnapshotSource};

use crate::models::{DataPoint, RawTelemetry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampling period of every requested statistic, in seconds
pub const PERIOD_SECS: i64 = 60;

/// How far back the current telemetry window reaches, in minutes
pub const LOOKBACK_MINUTES: i64 = 60;

/// Number of prior weeks sampled for the peak-load benchmark
pub const BENCHMARK_WEEKS: i64 = 2;

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window ending at `now` and reaching back `minutes`
    pub fn lookback(now: DateTime<Utc>, minutes: i64) -> Self {
        Self::new(now - Duration::minutes(minutes), now)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Trait for telemetry backends
///
/// Request volume belongs to the load balancer in front of every target
/// fleet; capacity and CPU are per fleet.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Request-volume sums per period
    async fn request_volume(&self, window: TimeWindow) -> Result<Vec<DataPoint>>;

    /// In-service capacity averages per period
    async fn capacity(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>>;

    /// CPU utilization averages per period (0-100)
    async fn cpu_utilization(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>>;
}

/// Fetch the last hour of telemetry for one fleet
///
/// The three reads run concurrently and all must succeed.
pub async fn fetch_current_telemetry(
    source: &dyn TelemetrySource,
    group: &str,
    now: DateTime<Utc>,
) -> Result<RawTelemetry> {
    let window = TimeWindow::lookback(now, LOOKBACK_MINUTES);
    debug!(group = %group, start = %window.start, end = %window.end, "Fetching current telemetry");

    let (request_volume, capacity, cpu_utilization) = tokio::try_join!(
        async {
            source
                .request_volume(window)
                .await
                .context("Failed to fetch request volume")
        },
        async {
            source
                .capacity(group, window)
                .await
                .with_context(|| format!("Failed to fetch capacity of {}", group))
        },
        async {
            source
                .cpu_utilization(group, window)
                .await
                .with_context(|| format!("Failed to fetch CPU utilization of {}", group))
        },
    )?;

    Ok(RawTelemetry {
        request_volume,
        capacity,
        cpu_utilization,
    })
}

/// Windows the benchmark is drawn from: the same time of day one and two
/// weeks ago, each `span_minutes` long
pub fn benchmark_windows(now: DateTime<Utc>, span_minutes: u32) -> Vec<TimeWindow> {
    (1..=BENCHMARK_WEEKS)
        .map(|weeks| {
            let start = now - Duration::weeks(weeks);
            TimeWindow::new(start, start + Duration::minutes(span_minutes as i64))
        })
        .collect()
}

/// Largest request-volume sum observed across the benchmark windows
///
/// Returns 0.0 when the windows hold no data points.
pub async fn fetch_peak_benchmark(
    source: &dyn TelemetrySource,
    now: DateTime<Utc>,
    span_minutes: u32,
) -> Result<f64> {
    let windows = benchmark_windows(now, span_minutes);
    let fetches = windows.iter().map(|window| async move {
        source
            .request_volume(*window)
            .await
            .with_context(|| format!("Failed to fetch benchmark window starting {}", window.start))
    });

    let peak = try_join_all(fetches)
        .await?
        .into_iter()
        .flatten()
        .inspect(|point| debug!(timestamp = %point.timestamp, value = point.value, "Benchmark point"))
        .fold(0.0_f64, |peak, point| peak.max(point.value));

    Ok(peak)
}
