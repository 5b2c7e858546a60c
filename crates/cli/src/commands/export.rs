//! Capture telemetry into a snapshot file

use anyhow::{Context, Result};
use autoscale_lib::{backend, telemetry::capture_snapshot};
use std::path::PathBuf;

use crate::config::Settings;
use crate::output::print_success;

/// Record what a run would read right now, for later offline replay
pub async fn export(settings: &Settings, output: Option<PathBuf>) -> Result<()> {
    let backend = backend::connect(&settings.backend).await?;

    let snapshot = capture_snapshot(
        backend.source.as_ref(),
        &settings.groups,
        backend.now(),
        settings.options.span_minutes,
    )
    .await
    .context("Failed to capture telemetry")?;

    match output {
        Some(path) => {
            snapshot.save(&path).await?;
            print_success(&format!(
                "Snapshot of {} group(s) written to {}",
                snapshot.groups.len(),
                path.display()
            ));
        }
        None => {
            let json = serde_json::to_string_pretty(&snapshot)?;
            println!("{}", json);
        }
    }

    Ok(())
}
