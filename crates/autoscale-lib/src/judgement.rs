//! Scale decision engine
//!
//! Turns a [`Series`] plus a historical peak-load benchmark into a
//! [`Verdict`]. Three checks run in a fixed order and later checks may
//! overwrite the action chosen by earlier ones:
//!
//! 1. scale-in: capacity above the conservative forecast marks `Shrink`
//! 2. scale-out: capacity below the minimal forecast marks `Grow`
//! 3. saturation: estimated CPU at or above the upper threshold marks `Grow`

use crate::error::EstimationError;
use crate::estimator::Series;
use crate::models::{Action, CpuThresholds, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale-in posture of the current capacity against the forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleInPosture {
    Moderate,
    MaybeModerate,
    Excess,
}

impl fmt::Display for ScaleInPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleInPosture::Moderate => "moderate",
            ScaleInPosture::MaybeModerate => "maybe moderate",
            ScaleInPosture::Excess => "excess",
        })
    }
}

/// Scale-out posture of the current capacity against the minimal forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleOutPosture {
    Sufficient,
    Insufficient,
}

impl fmt::Display for ScaleOutPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleOutPosture::Sufficient => "sufficient",
            ScaleOutPosture::Insufficient => "insufficient",
        })
    }
}

/// Whether the fleet currently runs hotter than the upper threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaturationPosture {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "ng")]
    Ng,
}

impl fmt::Display for SaturationPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SaturationPosture::Ok => "OK",
            SaturationPosture::Ng => "NG",
        })
    }
}

/// Capacities at the upper, middle and lower CPU thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityForecast {
    /// At the upper threshold: the minimal bound
    pub low: f64,
    /// At the middle threshold
    pub mid: f64,
    /// At the lower threshold: the conservative bound
    pub high: f64,
}

/// Inputs and intermediate results behind a verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgementTrace {
    pub thresholds: CpuThresholds,
    pub benchmark: f64,
    pub recent_efficiency: f64,
    pub estimated_cpu_utilization: f64,
    /// Required capacity for the latest observed volume
    pub current_required: CapacityForecast,
    /// Required capacity for the benchmark volume
    pub next_required: CapacityForecast,
    pub current_capacity: f64,
    pub scale_in: ScaleInPosture,
    pub scale_out: ScaleOutPosture,
    pub saturation: SaturationPosture,
}

/// A verdict together with the trace that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judged {
    pub verdict: Verdict,
    pub trace: JudgementTrace,
}

/// Decision engine over one series
pub struct Judgement<'a> {
    series: &'a Series,
    thresholds: CpuThresholds,
    benchmark: f64,
}

impl<'a> Judgement<'a> {
    pub fn new(series: &'a Series, thresholds: CpuThresholds, benchmark: f64) -> Self {
        Self {
            series,
            thresholds,
            benchmark,
        }
    }

    pub fn judge(&self) -> Result<Judged, EstimationError> {
        let upper = self.thresholds.upper;
        let middle = self.thresholds.middle();
        let lower = self.thresholds.lower;

        let recent_efficiency = self.series.recent_efficiency()?;
        let next_required = CapacityForecast {
            low: finite("low", self.series.estimate_required_capacity(self.benchmark, upper)?)?,
            mid: finite("mid", self.series.estimate_required_capacity(self.benchmark, middle)?)?,
            high: finite("high", self.series.estimate_required_capacity(self.benchmark, lower)?)?,
        };
        let current_required = CapacityForecast {
            low: self.series.estimated_latest_required_capacity(upper)?,
            mid: self.series.estimated_latest_required_capacity(middle)?,
            high: self.series.estimated_latest_required_capacity(lower)?,
        };
        let estimated_cpu_utilization = self.series.estimated_latest_cpu_utilization()?;

        let current = self.series.latest().capacity;
        let CapacityForecast { low, mid, high } = next_required;
        let mut action = Action::Stay;

        let scale_in = if low <= current && current <= high {
            ScaleInPosture::Moderate
        } else if current <= high {
            ScaleInPosture::MaybeModerate
        } else {
            action = Action::Shrink;
            ScaleInPosture::Excess
        };

        let scale_out = if low <= current {
            ScaleOutPosture::Sufficient
        } else {
            action = Action::Grow;
            ScaleOutPosture::Insufficient
        };

        let saturation = if estimated_cpu_utilization < upper * 100.0 {
            SaturationPosture::Ok
        } else {
            action = Action::Grow;
            SaturationPosture::Ng
        };

        let verdict = Verdict {
            current_capacity: current as i64,
            desired_capacity: mid as i64,
            action,
        };

        Ok(Judged {
            verdict,
            trace: JudgementTrace {
                thresholds: self.thresholds,
                benchmark: self.benchmark,
                recent_efficiency,
                estimated_cpu_utilization,
                current_required,
                next_required,
                current_capacity: current,
                scale_in,
                scale_out,
                saturation,
            },
        })
    }
}

fn finite(label: &'static str, value: f64) -> Result<f64, EstimationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EstimationError::UndefinedForecast { label, value })
    }
}
