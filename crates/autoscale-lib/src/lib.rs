//! Heuristic autoscaling library
//!
//! This crate provides the core functionality for:
//! - Merging request, capacity and CPU telemetry into a time series
//! - Smoothed efficiency estimation and capacity forecasting
//! - The scale decision engine (stay / grow / shrink)
//! - Telemetry and fleet-update backends
//! - Multi-fleet decision cycles, health checks and observability

pub mod backend;
pub mod error;
pub mod estimator;
pub mod fleet;
pub mod health;
pub mod judgement;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod telemetry;

pub use error::{ConfigError, EstimationError};
pub use estimator::{Sample, Series, RECENT_EFFICIENCY_WINDOW};
pub use judgement::{Judged, Judgement, JudgementTrace};
pub use models::*;
pub use observability::{DecisionObserver, NoopObserver, ScalerMetrics, StructuredLogger};
pub use pipeline::{run_cycle, CycleReport, FleetEvaluation, ScalingOptions};
