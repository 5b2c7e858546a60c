//! Merged, time-ordered telemetry series

use super::Sample;
use crate::error::EstimationError;
use crate::models::{DataPoint, RawTelemetry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Number of most recent valid samples averaged by [`Series::recent_efficiency`]
pub const RECENT_EFFICIENCY_WINDOW: usize = 6;

/// Samples for one decision cycle, ascending by timestamp
///
/// Built once from the three raw series. The chronologically latest merged
/// sample is always dropped: the monitoring system may still be flushing
/// that period, so its values are ambiguous.
#[derive(Debug, Clone)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Merge raw telemetry into a series
    ///
    /// Points are joined on exact timestamp equality. A timestamp missing
    /// from one source leaves that field at zero.
    pub fn from_telemetry(raw: &RawTelemetry) -> Result<Self, EstimationError> {
        let mut merged: BTreeMap<DateTime<Utc>, Sample> = BTreeMap::new();

        merge_into(&mut merged, &raw.request_volume, |s, v| s.request_volume = v);
        merge_into(&mut merged, &raw.capacity, |s, v| s.capacity = v);
        merge_into(&mut merged, &raw.cpu_utilization, |s, v| s.cpu_utilization = v);

        Self::from_merged(merged)
    }

    /// Build a series from already aligned samples
    ///
    /// Samples sharing a timestamp collapse into the last one given. The
    /// latest sample is dropped exactly as in [`Series::from_telemetry`].
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Result<Self, EstimationError> {
        let merged = samples.into_iter().map(|s| (s.timestamp, s)).collect();
        Self::from_merged(merged)
    }

    fn from_merged(merged: BTreeMap<DateTime<Utc>, Sample>) -> Result<Self, EstimationError> {
        if merged.len() < 2 {
            return Err(EstimationError::InsufficientSamples {
                found: merged.len(),
            });
        }

        let mut samples: Vec<Sample> = merged.into_values().collect();
        samples.pop();

        Ok(Self { samples })
    }

    /// Samples in ascending timestamp order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn ordered_timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&Sample> {
        self.samples
            .binary_search_by_key(&timestamp, |s| s.timestamp)
            .ok()
            .map(|i| &self.samples[i])
    }

    /// Most recent retained sample
    pub fn latest(&self) -> &Sample {
        // Construction guarantees at least one retained sample.
        &self.samples[self.samples.len() - 1]
    }

    /// Mean efficiency over the most recent valid samples
    ///
    /// Walks newest to oldest, skipping samples with infinite efficiency,
    /// and averages up to [`RECENT_EFFICIENCY_WINDOW`] of them.
    pub fn recent_efficiency(&self) -> Result<f64, EstimationError> {
        let valid: Vec<f64> = self
            .samples
            .iter()
            .rev()
            .map(Sample::efficiency)
            .filter(|e| !e.is_infinite())
            .take(RECENT_EFFICIENCY_WINDOW)
            .collect();

        if valid.is_empty() {
            return Err(EstimationError::NoValidEfficiency);
        }

        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        if !mean.is_finite() {
            return Err(EstimationError::UndefinedEfficiency(mean));
        }

        Ok(mean)
    }

    /// Capacity needed to serve `benchmark_volume` at `target_cpu`
    pub fn estimate_required_capacity(
        &self,
        benchmark_volume: f64,
        target_cpu: f64,
    ) -> Result<f64, EstimationError> {
        Ok(benchmark_volume / self.recent_efficiency()? / 100.0 / target_cpu)
    }

    /// Capacity needed to serve the latest observed volume at `target_cpu`
    pub fn estimated_latest_required_capacity(&self, target_cpu: f64) -> Result<f64, EstimationError> {
        let efficiency = self.recent_efficiency()?;
        Ok(self.latest().estimated_required_capacity(efficiency, target_cpu))
    }

    /// Smoothed estimate of the current CPU percent
    pub fn estimated_latest_cpu_utilization(&self) -> Result<f64, EstimationError> {
        let efficiency = self.recent_efficiency()?;
        Ok(self.latest().estimated_cpu_utilization(efficiency))
    }
}

fn merge_into(
    merged: &mut BTreeMap<DateTime<Utc>, Sample>,
    points: &[DataPoint],
    assign: impl Fn(&mut Sample, f64),
) {
    for point in points {
        let sample = merged
            .entry(point.timestamp)
            .or_insert_with(|| Sample::new(point.timestamp));
        assign(sample, point.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn points(values: &[(i64, f64)]) -> Vec<DataPoint> {
        values.iter().map(|&(m, v)| DataPoint::new(at(m), v)).collect()
    }

    fn uniform(n: i64, volume: f64, capacity: f64, cpu: f64) -> RawTelemetry {
        RawTelemetry {
            request_volume: (0..n).map(|m| DataPoint::new(at(m), volume)).collect(),
            capacity: (0..n).map(|m| DataPoint::new(at(m), capacity)).collect(),
            cpu_utilization: (0..n).map(|m| DataPoint::new(at(m), cpu)).collect(),
        }
    }

    #[test]
    fn test_drops_latest_sample() {
        let series = Series::from_telemetry(&uniform(7, 100.0, 2.0, 50.0)).unwrap();

        assert_eq!(series.len(), 6);
        assert_eq!(series.latest().timestamp, at(5));
        assert!(series.get(at(6)).is_none());
    }

    #[test]
    fn test_drops_latest_regardless_of_input_order() {
        let raw = RawTelemetry {
            request_volume: points(&[(3, 30.0), (0, 10.0), (2, 20.0), (1, 15.0)]),
            capacity: points(&[(1, 1.0), (3, 1.0), (0, 1.0), (2, 1.0)]),
            cpu_utilization: points(&[(2, 10.0), (1, 10.0), (3, 10.0), (0, 10.0)]),
        };
        let series = Series::from_telemetry(&raw).unwrap();

        assert_eq!(series.ordered_timestamps(), vec![at(0), at(1), at(2)]);
        assert_eq!(series.latest().request_volume, 20.0);
    }

    #[test]
    fn test_latest_dropped_even_when_only_in_one_source() {
        // Minute 4 only exists in the CPU series; it is still the latest key.
        let raw = RawTelemetry {
            request_volume: points(&[(0, 10.0), (1, 10.0), (2, 10.0)]),
            capacity: points(&[(0, 1.0), (1, 1.0), (2, 1.0)]),
            cpu_utilization: points(&[(0, 5.0), (1, 5.0), (2, 5.0), (4, 5.0)]),
        };
        let series = Series::from_telemetry(&raw).unwrap();

        assert_eq!(series.ordered_timestamps(), vec![at(0), at(1), at(2)]);
    }

    #[test]
    fn test_merge_independent_of_source_permutation() {
        let a = points(&[(0, 100.0), (1, 120.0), (2, 140.0), (3, 90.0)]);
        let b = points(&[(0, 2.0), (1, 2.0), (3, 3.0)]);
        let c = points(&[(1, 40.0), (2, 55.0), (3, 60.0), (0, 35.0)]);

        let baseline = Series::from_telemetry(&RawTelemetry {
            request_volume: a.clone(),
            capacity: b.clone(),
            cpu_utilization: c.clone(),
        })
        .unwrap();

        // Feed the same points with the merge order of the sources rotated
        // through the sample-level constructor.
        let permuted: Vec<Sample> = {
            let mut merged: BTreeMap<DateTime<Utc>, Sample> = BTreeMap::new();
            merge_into(&mut merged, &c, |s, v| s.cpu_utilization = v);
            merge_into(&mut merged, &a, |s, v| s.request_volume = v);
            merge_into(&mut merged, &b, |s, v| s.capacity = v);
            merged.into_values().collect()
        };
        let permuted = Series::from_samples(permuted).unwrap();

        assert_eq!(baseline.samples(), permuted.samples());
    }

    #[test]
    fn test_missing_field_defaults_to_zero() {
        let raw = RawTelemetry {
            request_volume: points(&[(0, 10.0), (1, 10.0), (2, 10.0)]),
            capacity: points(&[(0, 1.0), (2, 1.0)]),
            cpu_utilization: points(&[(0, 5.0), (1, 5.0), (2, 5.0)]),
        };
        let series = Series::from_telemetry(&raw).unwrap();

        let gap = series.get(at(1)).unwrap();
        assert_eq!(gap.capacity, 0.0);
        assert!(gap.efficiency().is_infinite());
    }

    #[test]
    fn test_recent_efficiency_uniform() {
        let series = Series::from_telemetry(&uniform(7, 100.0, 2.0, 50.0)).unwrap();
        assert!((series.recent_efficiency().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_recent_efficiency_window_skips_infinite() {
        // Retained minutes 0..=8; minute 7 has zero capacity. Efficiencies
        // are volume / (1 * 10), so minute m contributes (m + 1).
        let n = 10;
        let raw = RawTelemetry {
            request_volume: (0..n).map(|m| DataPoint::new(at(m), (m as f64 + 1.0) * 10.0)).collect(),
            capacity: (0..n)
                .map(|m| DataPoint::new(at(m), if m == 7 { 0.0 } else { 1.0 }))
                .collect(),
            cpu_utilization: (0..n).map(|m| DataPoint::new(at(m), 10.0)).collect(),
        };
        let series = Series::from_telemetry(&raw).unwrap();

        // Valid newest-first: minutes 8, 6, 5, 4, 3, 2 -> 9, 7, 6, 5, 4, 3
        let expected = (9.0 + 7.0 + 6.0 + 5.0 + 4.0 + 3.0) / 6.0;
        assert!((series.recent_efficiency().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_recent_efficiency_with_fewer_than_window() {
        let raw = RawTelemetry {
            request_volume: points(&[(0, 10.0), (1, 30.0), (2, 99.0)]),
            capacity: points(&[(0, 1.0), (1, 1.0), (2, 1.0)]),
            cpu_utilization: points(&[(0, 10.0), (1, 10.0), (2, 10.0)]),
        };
        let series = Series::from_telemetry(&raw).unwrap();

        assert!((series.recent_efficiency().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_recent_efficiency_without_valid_samples() {
        let series = Series::from_telemetry(&uniform(4, 100.0, 0.0, 50.0)).unwrap();
        assert_eq!(
            series.recent_efficiency(),
            Err(EstimationError::NoValidEfficiency)
        );
        assert!(series.estimated_latest_cpu_utilization().is_err());
    }

    #[test]
    fn test_recent_efficiency_nan_is_undefined() {
        // Zero volume, capacity and CPU: 0/0 is NaN, not infinite.
        let series = Series::from_telemetry(&uniform(3, 0.0, 0.0, 0.0)).unwrap();
        assert!(matches!(
            series.recent_efficiency(),
            Err(EstimationError::UndefinedEfficiency(_))
        ));
    }

    #[test]
    fn test_single_timestamp_is_rejected() {
        let result = Series::from_telemetry(&uniform(1, 100.0, 2.0, 50.0));
        assert_eq!(
            result.unwrap_err(),
            EstimationError::InsufficientSamples { found: 1 }
        );

        let empty = Series::from_telemetry(&RawTelemetry::default());
        assert_eq!(
            empty.unwrap_err(),
            EstimationError::InsufficientSamples { found: 0 }
        );
    }

    #[test]
    fn test_latest_point_estimates() {
        let series = Series::from_telemetry(&uniform(7, 100.0, 2.0, 50.0)).unwrap();

        // 100 / 1 / 2 = 50%
        assert!((series.estimated_latest_cpu_utilization().unwrap() - 50.0).abs() < 1e-12);
        // 100 / 1 / 100 / 0.5 = 2
        assert!((series.estimated_latest_required_capacity(0.5).unwrap() - 2.0).abs() < 1e-12);
        // 300 / 1 / 100 / 0.65
        let forecast = series.estimate_required_capacity(300.0, 0.65).unwrap();
        assert!((forecast - 300.0 / 65.0).abs() < 1e-12);
    }
}
