//! Decision cycle across one or more target fleets
//!
//! Every fleet is fetched and judged independently. The verdict with the
//! largest desired capacity is selected and its plan is applied to each
//! target fleet, one update attempt per fleet.

use crate::error::{ConfigError, EstimationError};
use crate::estimator::Series;
use crate::fleet::{apply_plan, plan_update, FleetManager, UpdateOutcome, UpdatePlan};
use crate::judgement::{Judged, Judgement};
use crate::models::{CapacityBounds, CpuThresholds, RawTelemetry, Verdict};
use crate::observability::DecisionObserver;
use crate::telemetry::{
    fetch_current_telemetry, fetch_peak_benchmark, TelemetrySource, LOOKBACK_MINUTES,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shortest benchmark span accepted, in minutes
pub const MIN_SPAN_MINUTES: u32 = 15;

/// Longest benchmark span accepted, in minutes
///
/// Keeps the benchmark windows clear of each other and of the current hour.
pub const MAX_SPAN_MINUTES: u32 = (BENCHMARK_WINDOW_GAP_MINUTES - LOOKBACK_MINUTES) as u32;

const BENCHMARK_WINDOW_GAP_MINUTES: i64 = 7 * 24 * 60;

/// Default benchmark span, in minutes
pub const DEFAULT_SPAN_MINUTES: u32 = 30;

/// Options shared by every fleet in a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingOptions {
    pub thresholds: CpuThresholds,
    pub span_minutes: u32,
    pub bounds: CapacityBounds,
    /// Preview only: plan updates but never issue them
    pub dry_run: bool,
}

impl Default for ScalingOptions {
    fn default() -> Self {
        Self {
            thresholds: CpuThresholds::default(),
            span_minutes: DEFAULT_SPAN_MINUTES,
            bounds: CapacityBounds::default(),
            dry_run: false,
        }
    }
}

impl ScalingOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.span_minutes < MIN_SPAN_MINUTES {
            return Err(ConfigError::SpanTooShort {
                min: MIN_SPAN_MINUTES,
                got: self.span_minutes,
            });
        }
        if self.span_minutes > MAX_SPAN_MINUTES {
            return Err(ConfigError::SpanTooLong {
                max: MAX_SPAN_MINUTES,
                got: self.span_minutes,
            });
        }

        let CpuThresholds { upper, lower } = self.thresholds;
        if !(lower > 0.0 && lower <= upper && upper <= 1.0) {
            return Err(ConfigError::InvalidThresholds { upper, lower });
        }

        if let (Some(min), Some(max)) = (self.bounds.min, self.bounds.max) {
            if min > max {
                return Err(ConfigError::InvalidBounds { min, max });
            }
        }

        Ok(())
    }
}

/// One fleet's series and verdict
#[derive(Debug, Clone)]
pub struct FleetEvaluation {
    pub group: String,
    pub series: Series,
    pub judged: Judged,
}

impl FleetEvaluation {
    pub fn verdict(&self) -> &Verdict {
        &self.judged.verdict
    }
}

/// Judge already fetched telemetry for one fleet
pub fn evaluate_telemetry(
    group: &str,
    raw: &RawTelemetry,
    thresholds: CpuThresholds,
    benchmark: f64,
    observer: &dyn DecisionObserver,
) -> Result<FleetEvaluation, EstimationError> {
    let series = Series::from_telemetry(raw)?;
    observer.on_series(group, &series);

    let judged = Judgement::new(&series, thresholds, benchmark).judge()?;
    observer.on_judgement(group, &judged);

    Ok(FleetEvaluation {
        group: group.to_string(),
        series,
        judged,
    })
}

/// Fetch and judge one fleet against a known benchmark
pub async fn evaluate_fleet(
    source: &dyn TelemetrySource,
    group: &str,
    options: &ScalingOptions,
    benchmark: f64,
    now: DateTime<Utc>,
    observer: &dyn DecisionObserver,
) -> Result<FleetEvaluation> {
    let raw = fetch_current_telemetry(source, group, now).await?;
    judge_reported(group, &raw, options, benchmark, observer)
}

fn judge_reported(
    group: &str,
    raw: &RawTelemetry,
    options: &ScalingOptions,
    benchmark: f64,
    observer: &dyn DecisionObserver,
) -> Result<FleetEvaluation> {
    evaluate_telemetry(group, raw, options.thresholds, benchmark, observer)
        .map_err(|e| {
            let error = anyhow::Error::new(e).context(format!("Failed to judge {}", group));
            observer.on_failure(group, &error);
            error
        })
}

/// The evaluation asking for the most capacity; the earliest wins a tie
pub fn select_most_demanding(evaluations: &[FleetEvaluation]) -> Option<&FleetEvaluation> {
    most_demanding_index(evaluations).map(|i| &evaluations[i])
}

fn most_demanding_index(evaluations: &[FleetEvaluation]) -> Option<usize> {
    // max_by_key keeps the last maximum, so walk backwards
    evaluations
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, e)| e.verdict().desired_capacity)
        .map(|(i, _)| i)
}

/// Everything one decision cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub benchmark: f64,
    pub evaluations: Vec<FleetEvaluation>,
    /// Index into `evaluations` of the verdict that was acted upon
    pub selected: usize,
    pub plan: UpdatePlan,
    pub outcomes: Vec<UpdateOutcome>,
}

impl CycleReport {
    pub fn selected(&self) -> &FleetEvaluation {
        &self.evaluations[self.selected]
    }

    pub fn failed_updates(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Run one full decision cycle
///
/// The benchmark and every fleet's telemetry are fetched concurrently.
/// Any fetch or estimation failure aborts the cycle before an update is
/// planned. Update failures are recorded per fleet in the report.
pub async fn run_cycle(
    source: &dyn TelemetrySource,
    manager: &dyn FleetManager,
    groups: &[String],
    options: &ScalingOptions,
    now: DateTime<Utc>,
    observer: &dyn DecisionObserver,
) -> Result<CycleReport> {
    options.validate()?;
    if groups.is_empty() {
        return Err(ConfigError::NoTargets.into());
    }

    let (benchmark, telemetry) = tokio::try_join!(
        async {
            fetch_peak_benchmark(source, now, options.span_minutes)
                .await
                .context("Failed to fetch peak-load benchmark")
        },
        try_join_all(groups.iter().map(|group| async move {
            fetch_current_telemetry(source, group, now)
                .await
                .map_err(|e| {
                    observer.on_failure(group, &e);
                    e
                })
        })),
    )?;
    observer.on_benchmark(benchmark);

    let evaluations = groups
        .iter()
        .zip(&telemetry)
        .map(|(group, raw)| judge_reported(group, raw, options, benchmark, observer))
        .collect::<Result<Vec<_>>>()?;

    let selected = most_demanding_index(&evaluations).context("No fleet was evaluated")?;
    let chosen = &evaluations[selected];
    observer.on_selected(chosen);

    let plan = plan_update(chosen.verdict(), &options.bounds, options.dry_run);
    info!(
        group = %chosen.group,
        action = %chosen.verdict().action,
        current = chosen.verdict().current_capacity,
        desired = chosen.verdict().desired_capacity,
        plan = ?plan,
        "Selected verdict"
    );

    let outcomes = join_all(groups.iter().map(|group| async move {
        match apply_plan(manager, group, plan).await {
            Ok(outcome) => outcome,
            Err(e) => {
                observer.on_failure(group, &e);
                UpdateOutcome {
                    group: group.clone(),
                    plan,
                    applied: false,
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }))
    .await;

    for outcome in &outcomes {
        observer.on_update(outcome);
    }

    Ok(CycleReport {
        benchmark,
        evaluations,
        selected,
        plan,
        outcomes,
    })
}
