//! Show the merged series behind a decision

use anyhow::Result;
use autoscale_lib::{
    backend, telemetry::fetch_current_telemetry, CpuThresholds, Sample, Series, StructuredLogger,
    DecisionObserver,
};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{format_number, format_percent, print_json, print_table, print_warning, OutputFormat};

/// One merged sample with its derived values
#[derive(Debug, Serialize)]
struct SampleView {
    timestamp: DateTime<Utc>,
    request_volume: f64,
    capacity: f64,
    cpu_utilization: f64,
    efficiency: f64,
    requests_per_unit: f64,
    required_upper: f64,
    required_middle: f64,
    required_lower: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_required_middle: Option<f64>,
}

impl SampleView {
    fn new(sample: &Sample, thresholds: CpuThresholds, recent_efficiency: Option<f64>) -> Self {
        Self {
            timestamp: sample.timestamp,
            request_volume: sample.request_volume,
            capacity: sample.capacity,
            cpu_utilization: sample.cpu_utilization,
            efficiency: sample.efficiency(),
            requests_per_unit: sample.requests_per_unit(),
            required_upper: sample.required_capacity(thresholds.upper),
            required_middle: sample.required_capacity(thresholds.middle()),
            required_lower: sample.required_capacity(thresholds.lower),
            estimated_required_middle: recent_efficiency
                .map(|e| sample.estimated_required_capacity(e, thresholds.middle())),
        }
    }
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Requests")]
    requests: String,
    #[tabled(rename = "Capacity")]
    capacity: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Efficiency")]
    efficiency: String,
    #[tabled(rename = "Req/Unit")]
    requests_per_unit: String,
    #[tabled(rename = "Req @Upper")]
    required_upper: String,
    #[tabled(rename = "Req @Middle")]
    required_middle: String,
    #[tabled(rename = "Req @Lower")]
    required_lower: String,
    #[tabled(rename = "Est. @Middle")]
    estimated_required_middle: String,
}

impl From<&SampleView> for SampleRow {
    fn from(view: &SampleView) -> Self {
        Self {
            timestamp: view.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            requests: format_number(view.request_volume),
            capacity: format_number(view.capacity),
            cpu: format_percent(view.cpu_utilization),
            efficiency: format!("{:.4}", view.efficiency),
            requests_per_unit: format_number(view.requests_per_unit),
            required_upper: format_number(view.required_upper),
            required_middle: format_number(view.required_middle),
            required_lower: format_number(view.required_lower),
            estimated_required_middle: view
                .estimated_required_middle
                .map(format_number)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Serialize)]
struct SeriesView {
    group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recent_efficiency: Option<f64>,
    samples: Vec<SampleView>,
}

impl SeriesView {
    fn new(group: &str, series: &Series, thresholds: CpuThresholds) -> Self {
        let recent_efficiency = series.recent_efficiency().ok();
        Self {
            group: group.to_string(),
            recent_efficiency,
            samples: series
                .samples()
                .iter()
                .map(|s| SampleView::new(s, thresholds, recent_efficiency))
                .collect(),
        }
    }
}

/// Print the merged series of every configured fleet
pub async fn inspect(settings: &Settings, format: OutputFormat) -> Result<()> {
    let backend = backend::connect(&settings.backend).await?;
    let logger = StructuredLogger::new("cli");
    let now = backend.now();

    let mut views = Vec::with_capacity(settings.groups.len());
    for group in &settings.groups {
        let raw = fetch_current_telemetry(backend.source.as_ref(), group, now).await?;
        let series = Series::from_telemetry(&raw)?;
        logger.on_series(group, &series);
        views.push(SeriesView::new(group, &series, settings.options.thresholds));
    }

    match format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Table => {
            for view in &views {
                println!("{} {}", "Series".bold(), view.group.cyan());
                match view.recent_efficiency {
                    Some(e) => println!("Recent efficiency: {:.4}", e),
                    None => print_warning("Recent efficiency is undefined"),
                }
                let rows: Vec<SampleRow> = view.samples.iter().map(SampleRow::from).collect();
                print_table(&rows);
                println!();
            }
        }
    }

    Ok(())
}
