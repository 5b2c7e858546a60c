//! Decide and apply a capacity update

use anyhow::Result;
use autoscale_lib::{
    backend::{self, BackendKind},
    fleet::{SkipReason, UpdateOutcome, UpdatePlan},
    run_cycle, CycleReport, Judged, StructuredLogger,
};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use crate::config::Settings;
use crate::output::{
    color_action, color_posture, format_number, format_percent, print_error, print_info,
    print_json, print_success, print_table, print_warning, OutputFormat,
};

/// Row for the per-fleet decision table
#[derive(Tabled)]
struct FleetRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Current")]
    current: i64,
    #[tabled(rename = "Efficiency")]
    efficiency: String,
    #[tabled(rename = "Est. CPU")]
    cpu: String,
    #[tabled(rename = "Low")]
    low: String,
    #[tabled(rename = "Mid")]
    mid: String,
    #[tabled(rename = "High")]
    high: String,
    #[tabled(rename = "Scale-in")]
    scale_in: String,
    #[tabled(rename = "Scale-out")]
    scale_out: String,
    #[tabled(rename = "Saturation")]
    saturation: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Desired")]
    desired: i64,
}

impl FleetRow {
    fn new(group: &str, judged: &Judged) -> Self {
        let trace = &judged.trace;
        Self {
            group: group.to_string(),
            current: judged.verdict.current_capacity,
            efficiency: format!("{:.4}", trace.recent_efficiency),
            cpu: format_percent(trace.estimated_cpu_utilization),
            low: format_number(trace.next_required.low),
            mid: format_number(trace.next_required.mid),
            high: format_number(trace.next_required.high),
            scale_in: color_posture(&trace.scale_in.to_string()),
            scale_out: color_posture(&trace.scale_out.to_string()),
            saturation: color_posture(&trace.saturation.to_string()),
            action: color_action(judged.verdict.action),
            desired: judged.verdict.desired_capacity,
        }
    }
}

#[derive(Serialize)]
struct FleetSummary<'a> {
    group: &'a str,
    #[serde(flatten)]
    judged: &'a Judged,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    benchmark: f64,
    fleets: Vec<FleetSummary<'a>>,
    selected: &'a str,
    plan: UpdatePlan,
    outcomes: &'a [UpdateOutcome],
}

impl<'a> RunSummary<'a> {
    fn new(report: &'a CycleReport) -> Self {
        Self {
            benchmark: report.benchmark,
            fleets: report
                .evaluations
                .iter()
                .map(|e| FleetSummary {
                    group: &e.group,
                    judged: &e.judged,
                })
                .collect(),
            selected: &report.selected().group,
            plan: report.plan,
            outcomes: &report.outcomes,
        }
    }
}

/// Run one decision cycle over the configured fleets
pub async fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
    let backend = backend::connect(&settings.backend).await?;
    let logger = StructuredLogger::new("cli");

    let report = run_cycle(
        backend.source.as_ref(),
        backend.manager.as_ref(),
        &settings.groups,
        &settings.options,
        backend.now(),
        &logger,
    )
    .await?;

    match format {
        OutputFormat::Json => print_json(&RunSummary::new(&report))?,
        OutputFormat::Table => print_report(&report, backend.kind),
    }

    let failed = report.failed_updates().count();
    info!(
        selected = %report.selected().group,
        plan = ?report.plan,
        failed_updates = failed,
        "Run complete"
    );
    if failed > 0 {
        anyhow::bail!("{} of {} capacity updates failed", failed, report.outcomes.len());
    }

    Ok(())
}

fn print_report(report: &CycleReport, kind: BackendKind) {
    println!("{}", "Scaling Decision".bold());
    println!("{}", "=".repeat(60));
    println!("Peak request volume: {}", format_number(report.benchmark).cyan());
    println!();

    let rows: Vec<FleetRow> = report
        .evaluations
        .iter()
        .map(|e| FleetRow::new(&e.group, &e.judged))
        .collect();
    print_table(&rows);

    let selected = report.selected();
    println!(
        "\nSelected: {} {} -> {} ({})",
        selected.group.cyan(),
        selected.verdict().current_capacity,
        selected.verdict().desired_capacity,
        color_action(selected.verdict().action)
    );
    println!();

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }

    if kind == BackendKind::Snapshot && report.outcomes.iter().any(|o| o.applied) {
        print_info("Snapshot backend: updates were recorded, not sent");
    }
}

fn print_outcome(outcome: &UpdateOutcome) {
    if let Some(error) = &outcome.error {
        print_error(&format!("{}: {}", outcome.group, error));
        return;
    }

    match outcome.plan {
        UpdatePlan::Skip {
            reason: SkipReason::Stay,
        } => print_info(&format!("{}: no capacity change needed", outcome.group)),
        UpdatePlan::Skip {
            reason: SkipReason::Preview { target },
        } => print_warning(&format!(
            "{}: dry run, capacity would be set to {}",
            outcome.group, target
        )),
        UpdatePlan::Apply { target, clamped } => {
            let suffix = if clamped { " (clamped to bounds)" } else { "" };
            print_success(&format!(
                "{}: capacity set to {}{}",
                outcome.group, target, suffix
            ));
        }
    }
}
