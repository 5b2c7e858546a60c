//! Amazon CloudWatch telemetry source
//!
//! Reads `RequestCount` from the classic load balancer, and
//! `GroupInServiceInstances` and `CPUUtilization` per Auto Scaling group.

use super::{TelemetrySource, TimeWindow, PERIOD_SECS};
use crate::models::DataPoint;
use anyhow::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatch::config::Region;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Statistic};
use aws_sdk_cloudwatch::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Identity of the load balancer the target fleets sit behind
#[derive(Debug, Clone)]
pub struct CloudWatchConfig {
    pub region: String,
    pub load_balancer_name: String,
    pub availability_zone: String,
}

pub struct CloudWatchSource {
    client: Client,
    config: CloudWatchConfig,
}

struct MetricQuery<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    dimensions: Vec<(&'a str, &'a str)>,
    statistic: Statistic,
}

impl CloudWatchSource {
    /// Build a source using the default AWS credential chain
    pub async fn connect(config: CloudWatchConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
            config,
        }
    }

    async fn get(&self, query: MetricQuery<'_>, window: TimeWindow) -> Result<Vec<DataPoint>> {
        debug!(
            namespace = query.namespace,
            metric = query.metric_name,
            start = %window.start,
            end = %window.end,
            "GetMetricStatistics"
        );

        let dimensions = query
            .dimensions
            .iter()
            .map(|(name, value)| Dimension::builder().name(*name).value(*value).build())
            .collect();

        let output = self
            .client
            .get_metric_statistics()
            .namespace(query.namespace)
            .metric_name(query.metric_name)
            .set_dimensions(Some(dimensions))
            .start_time(AwsDateTime::from_secs(window.start.timestamp()))
            .end_time(AwsDateTime::from_secs(window.end.timestamp()))
            .period(PERIOD_SECS as i32)
            .statistics(query.statistic.clone())
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "GetMetricStatistics {}/{} failed: {}",
                    query.namespace,
                    query.metric_name,
                    e.into_service_error()
                )
            })?;

        Ok(output
            .datapoints()
            .iter()
            .filter_map(|dp| to_data_point(dp, &query.statistic))
            .collect())
    }
}

fn to_data_point(datapoint: &Datapoint, statistic: &Statistic) -> Option<DataPoint> {
    let ts = datapoint.timestamp()?;
    let timestamp = DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())?;
    let value = match statistic {
        Statistic::Sum => datapoint.sum()?,
        _ => datapoint.average()?,
    };
    Some(DataPoint::new(timestamp, value))
}

#[async_trait]
impl TelemetrySource for CloudWatchSource {
    async fn request_volume(&self, window: TimeWindow) -> Result<Vec<DataPoint>> {
        let query = MetricQuery {
            namespace: "AWS/ELB",
            metric_name: "RequestCount",
            dimensions: vec![
                ("LoadBalancerName", self.config.load_balancer_name.as_str()),
                ("AvailabilityZone", self.config.availability_zone.as_str()),
            ],
            statistic: Statistic::Sum,
        };
        self.get(query, window).await
    }

    async fn capacity(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        let query = MetricQuery {
            namespace: "AWS/AutoScaling",
            metric_name: "GroupInServiceInstances",
            dimensions: vec![("AutoScalingGroupName", group)],
            statistic: Statistic::Average,
        };
        self.get(query, window).await
    }

    async fn cpu_utilization(&self, group: &str, window: TimeWindow) -> Result<Vec<DataPoint>> {
        let query = MetricQuery {
            namespace: "AWS/EC2",
            metric_name: "CPUUtilization",
            dimensions: vec![("AutoScalingGroupName", group)],
            statistic: Statistic::Average,
        };
        self.get(query, window).await
    }
}
