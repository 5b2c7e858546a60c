//! JSON telemetry snapshots
//!
//! A snapshot holds raw data points for the load balancer and each target
//! fleet, covering both the current lookback window and the benchmark
//! windows. [`SnapshotSource`] serves window-filtered reads from it so a
//! decision cycle can be replayed offline.

use super::{benchmark_windows, TelemetrySource, TimeWindow, LOOKBACK_MINUTES};
use crate::models::DataPoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-fleet telemetry in a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTelemetry {
    #[serde(default)]
    pub capacity: Vec<DataPoint>,
    #[serde(default)]
    pub cpu_utilization: Vec<DataPoint>,
}

/// Serialized telemetry snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Reference time the snapshot was taken at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request_volume: Vec<DataPoint>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupTelemetry>,
}

impl Snapshot {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write snapshot {}", path.display()))
    }
}

/// Telemetry source backed by a [`Snapshot`]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Snapshot::load(path).await?))
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.captured_at
    }

    fn group(&self, group: &str) -> Result<&GroupTelemetry> {
        self.snapshot
            .groups
            .get(group)
            .with_context(|| format!("Group {} is not present in the snapshot", group))
    }
}

fn within(points: &[DataPoint], window: TimeWindow) -> Vec<DataPoint> {
    points
        .iter()
        .filter(|p| window.contains(p.timestamp))
        .copied()
        .collect()
}

#[async_trait]
impl TelemetrySource for SnapshotSource {
    async fn request_volume(&self, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.snapshot.request_volume, window))
    }

    async fn capacity(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.group(group)?.capacity, window))
    }

    async fn cpu_utilization(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.group(group)?.cpu_utilization, window))
    }
}

/// Record everything one decision cycle at `now` would read from `source`
pub async fn capture_snapshot(
    source: &dyn TelemetrySource,
    groups: &[String],
    now: DateTime<Utc>,
    span_minutes: u32,
) -> Result<Snapshot> {
    let current = TimeWindow::lookback(now, LOOKBACK_MINUTES);

    let mut windows = benchmark_windows(now, span_minutes);
    windows.push(current);
    let fetched = try_join_all(windows.iter().map(|window| source.request_volume(*window))).await?;

    // Overlapping windows return the same point more than once
    let request_volume: Vec<DataPoint> = fetched
        .into_iter()
        .flatten()
        .map(|point| (point.timestamp, point))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect();

    let mut captured = BTreeMap::new();
    for group in groups {
        let (capacity, cpu_utilization) = tokio::try_join!(
            source.capacity(group, current),
            source.cpu_utilization(group, current),
        )?;
        captured.insert(
            group.clone(),
            GroupTelemetry {
                capacity,
                cpu_utilization,
            },
        );
    }

    Ok(Snapshot {
        captured_at: Some(now),
        request_volume,
        groups: captured,
    })
}
