//! Autoscale agent - long-running heuristic autoscaler
//!
//! Runs the decision cycle on a fixed interval and exposes health and
//! Prometheus metrics endpoints.

use autoscale_lib::{
    backend::{self, Backend},
    health::{components, HealthRegistry},
    run_cycle, EstimationError, ScalerMetrics, ScalingOptions, StructuredLogger,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a decision cycle needs
struct Scaler {
    backend: Backend,
    groups: Vec<String>,
    options: ScalingOptions,
    health: HealthRegistry,
    metrics: ScalerMetrics,
    logger: StructuredLogger,
}

impl Scaler {
    async fn run_once(&self) {
        let started = Instant::now();
        let observer = (self.logger.clone(), self.metrics.clone());

        let result = run_cycle(
            self.backend.source.as_ref(),
            self.backend.manager.as_ref(),
            &self.groups,
            &self.options,
            self.backend.now(),
            &observer,
        )
        .await;

        match result {
            Ok(report) => {
                info!(
                    group = %report.selected().group,
                    action = %report.selected().verdict().action,
                    failed_updates = report.failed_updates().count(),
                    "Decision cycle complete"
                );
                self.health.record_success(&report).await;
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Decision cycle failed");
                self.metrics.inc_cycle_failures();
                self.health.record_failure(failed_component(&e), &e).await;
            }
        }

        self.metrics
            .observe_cycle_duration(started.elapsed().as_secs_f64());
    }
}

/// Estimation failures belong to the engine, everything else to telemetry
fn failed_component(error: &anyhow::Error) -> &'static str {
    if error.chain().any(|cause| cause.is::<EstimationError>()) {
        components::ENGINE
    } else {
        components::TELEMETRY
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting autoscale-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    let options = config.scaling_options();
    options.validate().context("Invalid scaling options")?;
    if config.groups.is_empty() {
        anyhow::bail!("No target fleet configured; set AUTOSCALER_GROUPS");
    }
    info!(instance = %config.instance, groups = ?config.groups, "Agent configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new(config.failure_threshold);
    health_registry.register(components::TELEMETRY).await;
    health_registry.register(components::ENGINE).await;
    health_registry.register(components::FLEET).await;

    let metrics = ScalerMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(AGENT_VERSION, &config.groups);

    let backend = backend::connect(&config.backend_config())
        .await
        .context("Failed to connect telemetry backend")?;

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start health and metrics server
    let listener = api::bind(config.api_port).await?;
    let mut api_handle = tokio::spawn(api::serve(listener, app_state));

    let scaler = Scaler {
        backend,
        groups: config.groups.clone(),
        options,
        health: health_registry,
        metrics,
        logger: logger.clone(),
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => scaler.run_once().await,
            result = &mut api_handle => {
                logger.log_shutdown("API server exited");
                return match result {
                    Ok(Ok(())) => Err(anyhow::anyhow!("API server exited unexpectedly")),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(anyhow::Error::new(e).context("API server task failed")),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                logger.log_shutdown("SIGINT received");
                break;
            }
        }
    }

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimation_failures_blame_engine() {
        let error = anyhow::Error::new(EstimationError::NoValidEfficiency).context("Failed to judge web-a");
        assert_eq!(failed_component(&error), components::ENGINE);
    }

    #[test]
    fn test_fetch_failures_blame_telemetry() {
        let error = anyhow::anyhow!("connection reset").context("Failed to fetch request volume");
        assert_eq!(failed_component(&error), components::TELEMETRY);
    }
}
