//! Output formatting utilities

use autoscale_lib::Action;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Force terminal colours on or off for everything printed through `colored`
pub fn set_color(enabled: bool) {
    colored::control::set_override(enabled);
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a fractional capacity or rate
pub fn format_number(value: f64) -> String {
    format!("{:.2}", value)
}

/// Format a CPU percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Color an action by direction
pub fn color_action(action: Action) -> String {
    let label = action.to_string();
    match action {
        Action::Grow => label.green().bold().to_string(),
        Action::Shrink => label.yellow().bold().to_string(),
        Action::Stay => label,
    }
}

/// Color a posture label
pub fn color_posture(label: &str) -> String {
    match label {
        "moderate" | "sufficient" | "OK" => label.green().to_string(),
        "maybe moderate" => label.yellow().to_string(),
        "excess" | "insufficient" | "NG" => label.red().to_string(),
        _ => label.to_string(),
    }
}
