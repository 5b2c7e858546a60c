//! AWS Auto Scaling backed fleet manager

use super::FleetManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_autoscaling::config::Region;
use aws_sdk_autoscaling::Client;
use tracing::warn;

/// Updates Auto Scaling groups through `UpdateAutoScalingGroup`
pub struct AutoScalingFleetManager {
    client: Client,
}

impl AutoScalingFleetManager {
    /// Build a manager for `region` using the default AWS credential chain
    pub async fn connect(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl FleetManager for AutoScalingFleetManager {
    async fn set_capacity(&self, group: &str, capacity: i64) -> Result<()> {
        let capacity = i32::try_from(capacity)
            .with_context(|| format!("Capacity {} does not fit an Auto Scaling group", capacity))?;

        warn!(group = %group, capacity = capacity, "Updating Auto Scaling group capacity");

        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(group)
            .desired_capacity(capacity)
            .min_size(capacity)
            .max_size(capacity)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("UpdateAutoScalingGroup failed: {}", e.into_service_error()))?;

        Ok(())
    }
}
