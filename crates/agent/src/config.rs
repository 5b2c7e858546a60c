//! Agent configuration

use anyhow::{Context, Result};
use autoscale_lib::{
    backend::BackendConfig, pipeline::DEFAULT_SPAN_MINUTES, CapacityBounds, CpuThresholds,
    ScalingOptions, DEFAULT_LOWER_CPU_THRESHOLD, DEFAULT_UPPER_CPU_THRESHOLD,
};
use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Target fleets, comma separated in the environment
    #[serde(default)]
    pub groups: Vec<String>,

    /// Seconds between decision cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Replay telemetry from this snapshot instead of the cloud backend
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub elb_name: Option<String>,

    #[serde(default)]
    pub availability_zone: Option<String>,

    #[serde(default = "default_span")]
    pub span_minutes: u32,

    #[serde(default = "default_upper_cpu_threshold")]
    pub upper_cpu_threshold: f64,

    #[serde(default = "default_lower_cpu_threshold")]
    pub lower_cpu_threshold: f64,

    #[serde(default)]
    pub min_capacity: Option<i64>,

    #[serde(default)]
    pub max_capacity: Option<i64>,

    #[serde(default)]
    pub dry_run: bool,

    /// Consecutive failed cycles before the agent reports unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    300
}

fn default_span() -> u32 {
    DEFAULT_SPAN_MINUTES
}

fn default_upper_cpu_threshold() -> f64 {
    DEFAULT_UPPER_CPU_THRESHOLD
}

fn default_lower_cpu_threshold() -> f64 {
    DEFAULT_LOWER_CPU_THRESHOLD
}

fn default_failure_threshold() -> u32 {
    3
}

impl AgentConfig {
    /// Load configuration from `AUTOSCALER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_source(
            config::Environment::with_prefix("AUTOSCALER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("groups"),
        )
    }

    fn from_source(source: impl config::Source + Send + Sync + 'static) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    pub fn scaling_options(&self) -> ScalingOptions {
        ScalingOptions {
            thresholds: CpuThresholds::new(self.upper_cpu_threshold, self.lower_cpu_threshold),
            span_minutes: self.span_minutes,
            bounds: CapacityBounds::new(self.min_capacity, self.max_capacity),
            dry_run: self.dry_run,
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            snapshot: self.snapshot_path.clone(),
            region: self.region.clone(),
            load_balancer_name: self.elb_name.clone(),
            availability_zone: self.availability_zone.clone(),
        }
    }
}
