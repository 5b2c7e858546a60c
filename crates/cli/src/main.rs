//! Heuristic autoscaling CLI
//!
//! A one-shot entry point meant to be run as a scheduled job: fetches
//! telemetry for the target fleets, decides whether to grow or shrink
//! them, and applies the decision.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{export, inspect, run};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Heuristic autoscaling CLI
#[derive(Parser)]
#[command(name = "heuristic-autoscaling")]
#[command(author, version, about = "Heuristic autoscaling for load-balanced fleets", long_about = None)]
pub struct Cli {
    /// Cloud region of the load balancer and fleets
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Load balancer in front of the target fleets
    #[arg(long, global = true)]
    pub elb_name: Option<String>,

    /// Availability zone the request volume is read for
    #[arg(long, global = true)]
    pub availability_zone: Option<String>,

    /// Target fleet (repeat for several fleets behind the same load balancer)
    #[arg(long = "autoscaling-group-name", short = 'g', global = true)]
    pub autoscaling_group_names: Vec<String>,

    /// Benchmark span in minutes (at least 15)
    #[arg(long, global = true)]
    pub span: Option<u32>,

    /// Upper CPU threshold (fraction of 1.0)
    #[arg(long, global = true)]
    pub upper_cpu_threshold: Option<f64>,

    /// Lower CPU threshold (fraction of 1.0)
    #[arg(long, global = true)]
    pub lower_cpu_threshold: Option<f64>,

    /// Never set a capacity below this
    #[arg(long, global = true)]
    pub min_capacity: Option<i64>,

    /// Never set a capacity above this
    #[arg(long, global = true)]
    pub max_capacity: Option<i64>,

    /// Replay telemetry from a snapshot file instead of the cloud backend
    #[arg(long, global = true, env = "HEURISTIC_AUTOSCALING_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Colorize log output
    #[arg(long, global = true)]
    pub color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide and apply a capacity update
    Run {
        /// Show the decision without updating any fleet
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the merged series for each target fleet
    Inspect,

    /// Capture the telemetry a run would read into a snapshot file
    Export {
        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, color: bool) {
    output::set_color(color);

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.color);

    let file = config::Config::load()?;
    let dry_run = matches!(cli.command, Commands::Run { dry_run: true });
    let settings = config::Settings::resolve(&cli, file, dry_run)?;

    match cli.command {
        Commands::Run { .. } => {
            run::run(&settings, cli.format).await?;
        }
        Commands::Inspect => {
            inspect::inspect(&settings, cli.format).await?;
        }
        Commands::Export { output } => {
            export::export(&settings, output).await?;
        }
    }

    Ok(())
}
