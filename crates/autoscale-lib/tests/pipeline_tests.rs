//! Integration tests for the multi-fleet decision cycle

use anyhow::Result;
use async_trait::async_trait;
use autoscale_lib::{
    fleet::{RecordingFleetManager, SkipReason, UpdatePlan},
    pipeline::{evaluate_fleet, select_most_demanding},
    telemetry::{TelemetrySource, TimeWindow},
    Action, CapacityBounds, ConfigError, DataPoint, NoopObserver, ScalingOptions,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

/// Seven one-minute points ending just before `now`
fn recent(value: f64) -> Vec<DataPoint> {
    (0..7)
        .map(|i| DataPoint::new(now() - Duration::minutes(10 - i), value))
        .collect()
}

struct MemorySource {
    request_volume: Vec<DataPoint>,
    groups: HashMap<String, (Vec<DataPoint>, Vec<DataPoint>)>,
    broken_group: Option<String>,
}

impl MemorySource {
    /// Shared request volume of 100 per minute; benchmark peak of 300
    fn new() -> Self {
        let mut request_volume = recent(100.0);
        request_volume.push(DataPoint::new(
            now() - Duration::weeks(1) + Duration::minutes(5),
            300.0,
        ));
        request_volume.push(DataPoint::new(
            now() - Duration::weeks(2) + Duration::minutes(5),
            250.0,
        ));

        Self {
            request_volume,
            groups: HashMap::new(),
            broken_group: None,
        }
    }

    fn with_group(mut self, group: &str, capacity: f64, cpu: f64) -> Self {
        self.groups
            .insert(group.to_string(), (recent(capacity), recent(cpu)));
        self
    }

    fn with_broken_group(mut self, group: &str) -> Self {
        self.broken_group = Some(group.to_string());
        self
    }

    fn group(&self, group: &str) -> Result<&(Vec<DataPoint>, Vec<DataPoint>)> {
        if self.broken_group.as_deref() == Some(group) {
            anyhow::bail!("monitoring API unavailable");
        }
        self.groups
            .get(group)
            .ok_or_else(|| anyhow::anyhow!("Unknown group {}", group))
    }
}

fn within(points: &[DataPoint], window: TimeWindow) -> Vec<DataPoint> {
    points
        .iter()
        .filter(|p| window.contains(p.timestamp))
        .copied()
        .collect()
}

#[async_trait]
impl TelemetrySource for MemorySource {
    async fn request_volume(&self, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.request_volume, window))
    }

    async fn capacity(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.group(group)?.0, window))
    }

    async fn cpu_utilization(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        Ok(within(&self.group(group)?.1, window))
    }
}

/// web-a: efficiency 1, under-provisioned, wants 5.
/// web-b: efficiency 5, right-sized at 1.
fn two_fleets() -> (MemorySource, Vec<String>) {
    let source = MemorySource::new()
        .with_group("web-a", 2.0, 50.0)
        .with_group("web-b", 1.0, 20.0);
    (source, vec!["web-a".to_string(), "web-b".to_string()])
}

#[tokio::test]
async fn test_most_demanding_verdict_applied_to_every_fleet() {
    let (source, groups) = two_fleets();
    let manager = RecordingFleetManager::new();

    let report = autoscale_lib::run_cycle(
        &source,
        &manager,
        &groups,
        &ScalingOptions::default(),
        now(),
        &NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(report.benchmark, 300.0);
    assert_eq!(report.evaluations.len(), 2);
    assert_eq!(report.evaluations[1].verdict().action, Action::Stay);
    assert_eq!(report.evaluations[1].verdict().desired_capacity, 1);

    let selected = report.selected();
    assert_eq!(selected.group, "web-a");
    assert_eq!(selected.verdict().action, Action::Grow);
    assert_eq!(selected.verdict().desired_capacity, 5);
    assert_eq!(
        report.plan,
        UpdatePlan::Apply {
            target: 5,
            clamped: false
        }
    );

    assert!(report.outcomes.iter().all(|o| o.applied));
    assert_eq!(
        manager.requests().await,
        vec![("web-a".to_string(), 5), ("web-b".to_string(), 5)]
    );
}

#[tokio::test]
async fn test_dry_run_issues_no_update() {
    let (source, groups) = two_fleets();
    let manager = RecordingFleetManager::new();
    let options = ScalingOptions {
        dry_run: true,
        ..Default::default()
    };

    let report =
        autoscale_lib::run_cycle(&source, &manager, &groups, &options, now(), &NoopObserver)
            .await
            .unwrap();

    assert_eq!(
        report.plan,
        UpdatePlan::Skip {
            reason: SkipReason::Preview { target: 5 }
        }
    );
    assert!(report.outcomes.iter().all(|o| !o.applied));
    assert!(manager.requests().await.is_empty());
}

#[tokio::test]
async fn test_target_is_clamped_into_bounds() {
    let (source, groups) = two_fleets();
    let manager = RecordingFleetManager::new();
    let options = ScalingOptions {
        bounds: CapacityBounds::new(None, Some(3)),
        ..Default::default()
    };

    let report =
        autoscale_lib::run_cycle(&source, &manager, &groups, &options, now(), &NoopObserver)
            .await
            .unwrap();

    assert_eq!(
        report.plan,
        UpdatePlan::Apply {
            target: 3,
            clamped: true
        }
    );
    assert!(manager.requests().await.iter().all(|(_, c)| *c == 3));
}

#[tokio::test]
async fn test_update_failure_is_recorded_per_fleet() {
    let (source, groups) = two_fleets();
    let manager = RecordingFleetManager::failing("rate exceeded");

    let report = autoscale_lib::run_cycle(
        &source,
        &manager,
        &groups,
        &ScalingOptions::default(),
        now(),
        &NoopObserver,
    )
    .await
    .unwrap();

    let failed: Vec<_> = report.failed_updates().collect();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|o| !o.applied && o.error.as_deref().unwrap().contains("rate exceeded")));
}

#[tokio::test]
async fn test_telemetry_failure_aborts_cycle() {
    let (source, groups) = two_fleets();
    let source = source.with_broken_group("web-b");
    let manager = RecordingFleetManager::new();

    let result = autoscale_lib::run_cycle(
        &source,
        &manager,
        &groups,
        &ScalingOptions::default(),
        now(),
        &NoopObserver,
    )
    .await;

    assert!(result.is_err());
    assert!(manager.requests().await.is_empty());
}

#[tokio::test]
async fn test_no_target_groups() {
    let (source, _) = two_fleets();
    let manager = RecordingFleetManager::new();

    let error = autoscale_lib::run_cycle(
        &source,
        &manager,
        &[],
        &ScalingOptions::default(),
        now(),
        &NoopObserver,
    )
    .await
    .unwrap_err();

    assert_eq!(
        error.downcast_ref::<ConfigError>(),
        Some(&ConfigError::NoTargets)
    );
}

#[tokio::test]
async fn test_insufficient_history_fails_estimation() {
    let mut source = MemorySource::new();
    source.groups.insert(
        "web-c".to_string(),
        (
            vec![DataPoint::new(now() - Duration::minutes(2), 2.0)],
            vec![DataPoint::new(now() - Duration::minutes(2), 50.0)],
        ),
    );
    // Request volume shares only the one timestamp
    source.request_volume = vec![DataPoint::new(now() - Duration::minutes(2), 100.0)];

    let result = evaluate_fleet(
        &source,
        "web-c",
        &ScalingOptions::default(),
        300.0,
        now(),
        &NoopObserver,
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_evaluate_single_fleet() {
    let (source, _) = two_fleets();

    let evaluation = evaluate_fleet(
        &source,
        "web-a",
        &ScalingOptions::default(),
        300.0,
        now(),
        &NoopObserver,
    )
    .await
    .unwrap();

    // The latest of the seven points is dropped
    assert_eq!(evaluation.series.len(), 6);
    assert_eq!(evaluation.verdict().current_capacity, 2);
    assert_eq!(evaluation.verdict().desired_capacity, 5);

    let evaluations = [evaluation];
    let chosen = select_most_demanding(&evaluations).unwrap();
    assert_eq!(chosen.group, "web-a");
}
