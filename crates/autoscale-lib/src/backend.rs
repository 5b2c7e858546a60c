//! Backend selection
//!
//! A snapshot file selects the offline backend: telemetry replayed from
//! JSON, updates recorded in memory. Otherwise the AWS backend is used,
//! which requires the `aws` feature.

use crate::fleet::{FleetManager, RecordingFleetManager};
use crate::telemetry::{SnapshotSource, TelemetrySource};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Replay telemetry from this snapshot instead of a cloud backend
    pub snapshot: Option<PathBuf>,
    pub region: Option<String>,
    pub load_balancer_name: Option<String>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Snapshot,
    Aws,
}

/// Connected telemetry source and fleet manager
pub struct Backend {
    pub kind: BackendKind,
    pub source: Arc<dyn TelemetrySource>,
    pub manager: Arc<dyn FleetManager>,
    /// Time the snapshot was captured at, if replaying one
    pub reference_time: Option<DateTime<Utc>>,
}

impl Backend {
    /// Reference time for a cycle: the snapshot time when replaying
    pub fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }
}

pub async fn connect(config: &BackendConfig) -> Result<Backend> {
    if let Some(path) = &config.snapshot {
        let source = SnapshotSource::load(path).await?;
        info!(path = %path.display(), "Using snapshot telemetry backend");

        return Ok(Backend {
            kind: BackendKind::Snapshot,
            reference_time: source.captured_at(),
            source: Arc::new(source),
            manager: Arc::new(RecordingFleetManager::new()),
        });
    }

    connect_aws(config).await
}

#[cfg(feature = "aws")]
async fn connect_aws(config: &BackendConfig) -> Result<Backend> {
    use crate::fleet::AutoScalingFleetManager;
    use crate::telemetry::{CloudWatchConfig, CloudWatchSource};

    let region = config.region.clone().context("A region is required")?;
    let cloudwatch = CloudWatchConfig {
        region: region.clone(),
        load_balancer_name: config
            .load_balancer_name
            .clone()
            .context("A load balancer name is required")?,
        availability_zone: config
            .availability_zone
            .clone()
            .context("An availability zone is required")?,
    };
    info!(region = %region, elb = %cloudwatch.load_balancer_name, "Using AWS backend");

    Ok(Backend {
        kind: BackendKind::Aws,
        source: Arc::new(CloudWatchSource::connect(cloudwatch).await),
        manager: Arc::new(AutoScalingFleetManager::connect(&region).await),
        reference_time: None,
    })
}

#[cfg(not(feature = "aws"))]
async fn connect_aws(_config: &BackendConfig) -> Result<Backend> {
    Err(anyhow::anyhow!(
        "No telemetry backend available: pass a snapshot file or build with the `aws` feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Snapshot;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_backend_uses_capture_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        let captured_at = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
        Snapshot {
            captured_at: Some(captured_at),
            ..Default::default()
        }
        .save(&path)
        .await
        .unwrap();

        let backend = connect(&BackendConfig {
            snapshot: Some(path),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(backend.kind, BackendKind::Snapshot);
        assert_eq!(backend.now(), captured_at);
    }

    #[tokio::test]
    async fn test_missing_snapshot_fails() {
        let result = connect(&BackendConfig {
            snapshot: Some(PathBuf::from("/nonexistent/snapshot.json")),
            ..Default::default()
        })
        .await;

        assert!(result.is_err());
    }
}
