//! Observability for decision cycles
//!
//! Provides:
//! - [`DecisionObserver`], the hook the core reports structured events to
//! - [`StructuredLogger`], an observer emitting tracing events
//! - [`ScalerMetrics`], an observer feeding Prometheus metrics

use crate::estimator::Series;
use crate::fleet::{SkipReason, UpdateOutcome, UpdatePlan};
use crate::judgement::Judged;
use crate::models::Action;
use crate::pipeline::FleetEvaluation;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Receives structured events from a decision cycle
///
/// Every method defaults to a no-op. The estimation core never writes
/// output itself; callers inject an observer to make decisions auditable.
pub trait DecisionObserver: Send + Sync {
    fn on_series(&self, _group: &str, _series: &Series) {}

    fn on_benchmark(&self, _benchmark: f64) {}

    fn on_judgement(&self, _group: &str, _judged: &Judged) {}

    fn on_selected(&self, _evaluation: &FleetEvaluation) {}

    fn on_update(&self, _outcome: &UpdateOutcome) {}

    fn on_failure(&self, _group: &str, _error: &anyhow::Error) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DecisionObserver for NoopObserver {}

impl<A: DecisionObserver, B: DecisionObserver> DecisionObserver for (A, B) {
    fn on_series(&self, group: &str, series: &Series) {
        self.0.on_series(group, series);
        self.1.on_series(group, series);
    }

    fn on_benchmark(&self, benchmark: f64) {
        self.0.on_benchmark(benchmark);
        self.1.on_benchmark(benchmark);
    }

    fn on_judgement(&self, group: &str, judged: &Judged) {
        self.0.on_judgement(group, judged);
        self.1.on_judgement(group, judged);
    }

    fn on_selected(&self, evaluation: &FleetEvaluation) {
        self.0.on_selected(evaluation);
        self.1.on_selected(evaluation);
    }

    fn on_update(&self, outcome: &UpdateOutcome) {
        self.0.on_update(outcome);
        self.1.on_update(outcome);
    }

    fn on_failure(&self, group: &str, error: &anyhow::Error) {
        self.0.on_failure(group, error);
        self.1.on_failure(group, error);
    }
}

/// Structured logger for decision events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, groups: &[String]) {
        info!(
            event = "autoscaler_started",
            instance = %self.instance,
            version = %version,
            groups = ?groups,
            "Autoscaler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "autoscaler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Autoscaler shutting down"
        );
    }
}

impl DecisionObserver for StructuredLogger {
    fn on_series(&self, group: &str, series: &Series) {
        for sample in series.samples() {
            debug!(
                event = "sample",
                group = %group,
                timestamp = %sample.timestamp,
                request_volume = sample.request_volume,
                capacity = sample.capacity,
                cpu_utilization = sample.cpu_utilization,
                efficiency = sample.efficiency(),
                requests_per_unit = sample.requests_per_unit(),
                "Merged sample"
            );
        }
    }

    fn on_benchmark(&self, benchmark: f64) {
        debug!(
            event = "benchmark",
            instance = %self.instance,
            benchmark = benchmark,
            "Peak request volume track record"
        );
    }

    fn on_judgement(&self, group: &str, judged: &Judged) {
        let trace = &judged.trace;
        info!(
            event = "judgement",
            instance = %self.instance,
            group = %group,
            recent_efficiency = trace.recent_efficiency,
            estimated_cpu_utilization = trace.estimated_cpu_utilization,
            current_required_low = trace.current_required.low,
            current_required_mid = trace.current_required.mid,
            current_required_high = trace.current_required.high,
            next_required_low = trace.next_required.low,
            next_required_mid = trace.next_required.mid,
            next_required_high = trace.next_required.high,
            scale_in = %trace.scale_in,
            scale_out = %trace.scale_out,
            saturation = %trace.saturation,
            action = %judged.verdict.action,
            current = judged.verdict.current_capacity,
            desired = judged.verdict.desired_capacity,
            "Judged fleet"
        );
    }

    fn on_selected(&self, evaluation: &FleetEvaluation) {
        info!(
            event = "verdict_selected",
            instance = %self.instance,
            group = %evaluation.group,
            action = %evaluation.verdict().action,
            desired = evaluation.verdict().desired_capacity,
            "Most demanding verdict selected"
        );
    }

    fn on_update(&self, outcome: &UpdateOutcome) {
        match (&outcome.error, outcome.plan) {
            (Some(error), _) => warn!(
                event = "capacity_update_failed",
                instance = %self.instance,
                group = %outcome.group,
                error = %error,
                "Capacity update failed"
            ),
            (None, UpdatePlan::Apply { target, clamped }) => warn!(
                event = "capacity_updated",
                instance = %self.instance,
                group = %outcome.group,
                capacity = target,
                clamped = clamped,
                "Capacity updated"
            ),
            (None, UpdatePlan::Skip { reason: SkipReason::Preview { target } }) => info!(
                event = "capacity_update_previewed",
                instance = %self.instance,
                group = %outcome.group,
                capacity = target,
                "Dry-run mode, update not issued"
            ),
            (None, UpdatePlan::Skip { reason: SkipReason::Stay }) => debug!(
                event = "capacity_unchanged",
                instance = %self.instance,
                group = %outcome.group,
                "No capacity change needed"
            ),
        }
    }

    fn on_failure(&self, group: &str, error: &anyhow::Error) {
        warn!(
            event = "cycle_failure",
            instance = %self.instance,
            group = %group,
            error = %format!("{:#}", error),
            "Decision cycle failed"
        );
    }
}

/// Default histogram buckets for cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScalerMetricsInner> = OnceLock::new();

struct ScalerMetricsInner {
    cycle_duration_seconds: Histogram,
    cycle_failures: IntCounter,
    recent_efficiency: GaugeVec,
    estimated_cpu_utilization: GaugeVec,
    current_capacity: GaugeVec,
    desired_capacity: GaugeVec,
    decisions: IntCounterVec,
    updates_applied: IntCounterVec,
}

impl ScalerMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "autoscaler_cycle_duration_seconds",
                "Time spent on one fetch-judge-update cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycle_failures: register_int_counter!(
                "autoscaler_cycle_failures_total",
                "Total number of failed decision cycles"
            )
            .expect("Failed to register cycle_failures"),

            recent_efficiency: register_gauge_vec!(
                "autoscaler_recent_efficiency",
                "Smoothed requests per unit of capacity x CPU percent",
                &["group"]
            )
            .expect("Failed to register recent_efficiency"),

            estimated_cpu_utilization: register_gauge_vec!(
                "autoscaler_estimated_cpu_utilization_percent",
                "Smoothed estimate of the current CPU utilization",
                &["group"]
            )
            .expect("Failed to register estimated_cpu_utilization"),

            current_capacity: register_gauge_vec!(
                "autoscaler_current_capacity",
                "In-service capacity of the latest retained sample",
                &["group"]
            )
            .expect("Failed to register current_capacity"),

            desired_capacity: register_gauge_vec!(
                "autoscaler_desired_capacity",
                "Capacity forecast at the middle CPU threshold",
                &["group"]
            )
            .expect("Failed to register desired_capacity"),

            decisions: register_int_counter_vec!(
                "autoscaler_decisions_total",
                "Verdicts produced, by action",
                &["group", "action"]
            )
            .expect("Failed to register decisions"),

            updates_applied: register_int_counter_vec!(
                "autoscaler_updates_applied_total",
                "Capacity update requests accepted by the fleet manager",
                &["group"]
            )
            .expect("Failed to register updates_applied"),
        }
    }
}

/// Prometheus metrics for the autoscaler
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ScalerMetrics {
    _private: (),
}

impl Default for ScalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScalerMetricsInner {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cycle_failures(&self) {
        self.inner().cycle_failures.inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn decisions(&self, group: &str, action: Action) -> u64 {
        self.inner()
            .decisions
            .with_label_values(&[group, action.as_str()])
            .get()
    }
}

impl DecisionObserver for ScalerMetrics {
    fn on_judgement(&self, group: &str, judged: &Judged) {
        let inner = self.inner();
        inner
            .recent_efficiency
            .with_label_values(&[group])
            .set(judged.trace.recent_efficiency);
        inner
            .estimated_cpu_utilization
            .with_label_values(&[group])
            .set(judged.trace.estimated_cpu_utilization);
        inner
            .current_capacity
            .with_label_values(&[group])
            .set(judged.verdict.current_capacity as f64);
        inner
            .desired_capacity
            .with_label_values(&[group])
            .set(judged.verdict.desired_capacity as f64);
        inner
            .decisions
            .with_label_values(&[group, judged.verdict.action.as_str()])
            .inc();
    }

    fn on_update(&self, outcome: &UpdateOutcome) {
        if outcome.applied {
            self.inner()
                .updates_applied
                .with_label_values(&[outcome.group.as_str()])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::Sample;
    use crate::judgement::Judgement;
    use crate::models::CpuThresholds;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DecisionObserver for Recorder {
        fn on_benchmark(&self, benchmark: f64) {
            self.events.lock().unwrap().push(format!("benchmark {}", benchmark));
        }

        fn on_judgement(&self, group: &str, judged: &Judged) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} {}", group, judged.verdict.action));
        }
    }

    fn judged() -> Judged {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let series = Series::from_samples(
            (0..7).map(|m| Sample::with_values(start + Duration::minutes(m), 100.0, 2.0, 50.0)),
        )
        .unwrap();
        Judgement::new(&series, CpuThresholds::default(), 300.0)
            .judge()
            .unwrap()
    }

    #[test]
    fn test_pair_observer_forwards_to_both() {
        let pair = (Recorder::default(), Recorder::default());
        pair.on_benchmark(42.0);
        pair.on_judgement("web", &judged());

        for recorder in [&pair.0, &pair.1] {
            let events = recorder.events.lock().unwrap();
            assert_eq!(*events, vec!["benchmark 42".to_string(), "web Grow".to_string()]);
        }
    }

    #[test]
    fn test_metrics_count_decisions() {
        let metrics = ScalerMetrics::new();
        let before = metrics.decisions("metrics-test", Action::Grow);

        metrics.on_judgement("metrics-test", &judged());
        metrics.observe_cycle_duration(0.2);
        metrics.inc_cycle_failures();

        assert_eq!(metrics.decisions("metrics-test", Action::Grow), before + 1);

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("autoscaler_decisions_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
        logger.on_judgement("web", &judged());
    }
}
