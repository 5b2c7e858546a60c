//! Error types for the estimation core and option validation

use thiserror::Error;

/// Failures of the estimation and decision core
///
/// None of these are recovered locally. A caller should abandon the cycle
/// and retry on fresh telemetry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("series needs at least 2 distinct timestamps, found {found}")]
    InsufficientSamples { found: usize },

    #[error("no sample with a finite efficiency in the series")]
    NoValidEfficiency,

    #[error("recent efficiency is undefined ({0})")]
    UndefinedEfficiency(f64),

    #[error("{label} forecast is undefined ({value})")]
    UndefinedForecast { label: &'static str, value: f64 },
}

/// Invalid scaling options
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("span must be at least {min} minutes, got {got}")]
    SpanTooShort { min: u32, got: u32 },

    #[error("span must be at most {max} minutes, got {got}")]
    SpanTooLong { max: u32, got: u32 },

    #[error("CPU thresholds must satisfy 0 < lower <= upper <= 1 (upper={upper}, lower={lower})")]
    InvalidThresholds { upper: f64, lower: f64 },

    #[error("minimum capacity {min} exceeds maximum capacity {max}")]
    InvalidBounds { min: i64, max: i64 },

    #[error("at least one target fleet is required")]
    NoTargets,
}
