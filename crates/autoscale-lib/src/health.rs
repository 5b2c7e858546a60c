//! Health tracking for the long-running autoscaler
//!
//! Each decision cycle updates the status of the telemetry, engine and
//! fleet components; probes report the worst of them.

use crate::pipeline::CycleReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const TELEMETRY: &str = "telemetry";
    pub const ENGINE: &str = "engine";
    pub const FLEET: &str = "fleet";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still operational, last attempt failed
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_cycle: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
    consecutive_failures: u32,
    last_successful_cycle: Option<i64>,
}

/// Shared health registry
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
    /// Consecutive failed cycles after which a component turns unhealthy
    failure_threshold: u32,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new(3)
    }
}

impl HealthRegistry {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: Arc::default(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    /// Record a successful cycle
    pub async fn record_success(&self, report: &CycleReport) {
        let mut state = self.state.write().await;
        state.consecutive_failures = 0;
        state.last_successful_cycle = Some(chrono::Utc::now().timestamp());
        state
            .components
            .insert(components::TELEMETRY.to_string(), ComponentHealth::healthy());
        state
            .components
            .insert(components::ENGINE.to_string(), ComponentHealth::healthy());

        let failed: Vec<&str> = report.failed_updates().map(|o| o.group.as_str()).collect();
        let fleet = if failed.is_empty() {
            ComponentHealth::healthy()
        } else {
            ComponentHealth::degraded(format!("Capacity update failed for {}", failed.join(", ")))
        };
        state.components.insert(components::FLEET.to_string(), fleet);
    }

    /// Record a cycle that failed before any update was planned
    pub async fn record_failure(&self, component: &str, error: &anyhow::Error) {
        let mut state = self.state.write().await;
        state.consecutive_failures += 1;

        let message = format!("{:#}", error);
        let health = if state.consecutive_failures >= self.failure_threshold {
            ComponentHealth::unhealthy(message)
        } else {
            ComponentHealth::degraded(message)
        };
        state.components.insert(component.to_string(), health);
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse {
            status,
            components: state.components.clone(),
            last_successful_cycle: state.last_successful_cycle,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = self.state.read().await.ready;
        let health = self.health().await;

        let reason = if !ready {
            Some("Autoscaler not yet initialized".to_string())
        } else if health.status == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy".to_string())
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
