//! In-memory fleet manager
//!
//! Records every capacity request instead of calling a cloud API. Used by
//! the offline snapshot backend and by tests.

use super::FleetManager;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Clone, Default)]
pub struct RecordingFleetManager {
    requests: Arc<RwLock<Vec<(String, i64)>>>,
    failure: Option<String>,
}

impl RecordingFleetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager whose every request fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            requests: Arc::default(),
            failure: Some(message.into()),
        }
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<(String, i64)> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl FleetManager for RecordingFleetManager {
    async fn set_capacity(&self, group: &str, capacity: i64) -> Result<()> {
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }

        info!(group = %group, capacity = capacity, "Recorded capacity update");
        self.requests.write().await.push((group.to_string(), capacity));
        Ok(())
    }
}
