//! Configuration management for the CLI
//!
//! Flags win over the defaults file at
//! `~/.config/heuristic-autoscaling/config.json`.

use anyhow::{Context, Result};
use autoscale_lib::{
    backend::BackendConfig, pipeline::DEFAULT_SPAN_MINUTES, CapacityBounds, CpuThresholds,
    ScalingOptions, DEFAULT_LOWER_CPU_THRESHOLD, DEFAULT_UPPER_CPU_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::Cli;

/// CLI defaults file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub region: Option<String>,
    pub elb_name: Option<String>,
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub autoscaling_group_names: Vec<String>,
    pub span: Option<u32>,
    pub upper_cpu_threshold: Option<f64>,
    pub lower_cpu_threshold: Option<f64>,
    pub min_capacity: Option<i64>,
    pub max_capacity: Option<i64>,
}

impl Config {
    /// Load the defaults file, or empty defaults when there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| {
            home.join(".config")
                .join("heuristic-autoscaling")
                .join("config.json")
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("No target fleet given; pass --autoscaling-group-name")]
    NoGroups,
}

/// Everything a command needs, resolved from flags and the defaults file
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendConfig,
    pub groups: Vec<String>,
    pub options: ScalingOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: Config, dry_run: bool) -> Result<Self> {
        let groups = if cli.autoscaling_group_names.is_empty() {
            file.autoscaling_group_names
        } else {
            cli.autoscaling_group_names.clone()
        };
        if groups.is_empty() {
            return Err(SettingsError::NoGroups.into());
        }

        let options = ScalingOptions {
            thresholds: CpuThresholds::new(
                cli.upper_cpu_threshold
                    .or(file.upper_cpu_threshold)
                    .unwrap_or(DEFAULT_UPPER_CPU_THRESHOLD),
                cli.lower_cpu_threshold
                    .or(file.lower_cpu_threshold)
                    .unwrap_or(DEFAULT_LOWER_CPU_THRESHOLD),
            ),
            span_minutes: cli.span.or(file.span).unwrap_or(DEFAULT_SPAN_MINUTES),
            bounds: CapacityBounds::new(
                cli.min_capacity.or(file.min_capacity),
                cli.max_capacity.or(file.max_capacity),
            ),
            dry_run,
        };
        options.validate()?;

        Ok(Self {
            backend: BackendConfig {
                snapshot: cli.snapshot.clone(),
                region: cli.region.clone().or(file.region),
                load_balancer_name: cli.elb_name.clone().or(file.elb_name),
                availability_zone: cli.availability_zone.clone().or(file.availability_zone),
            },
            groups,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("heuristic-autoscaling").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_file() {
        let cli = parse(&["-g", "web-a", "--span", "45", "--region", "eu-west-1", "run"]);
        let file = Config {
            region: Some("us-east-1".to_string()),
            elb_name: Some("front".to_string()),
            autoscaling_group_names: vec!["from-file".to_string()],
            span: Some(60),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, file, false).unwrap();
        assert_eq!(settings.groups, vec!["web-a".to_string()]);
        assert_eq!(settings.options.span_minutes, 45);
        assert_eq!(settings.backend.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.backend.load_balancer_name.as_deref(), Some("front"));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-g", "web-a", "-g", "web-b", "run"]);
        let settings = Settings::resolve(&cli, Config::default(), true).unwrap();

        assert_eq!(settings.groups.len(), 2);
        assert_eq!(settings.options.span_minutes, 30);
        assert_eq!(settings.options.thresholds, CpuThresholds::default());
        assert!(settings.options.dry_run);
    }

    #[test]
    fn test_missing_groups() {
        let cli = parse(&["run"]);
        let error = Settings::resolve(&cli, Config::default(), false).unwrap_err();
        assert_eq!(
            error.downcast_ref::<SettingsError>(),
            Some(&SettingsError::NoGroups)
        );
    }

    #[test]
    fn test_short_span_rejected() {
        let cli = parse(&["-g", "web-a", "--span", "10", "run"]);
        assert!(Settings::resolve(&cli, Config::default(), false).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"region": "ap-northeast-1", "autoscaling_group_names": ["web-a"], "max_capacity": 12}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.region.as_deref(), Some("ap-northeast-1"));
        assert_eq!(config.autoscaling_group_names, vec!["web-a".to_string()]);
        assert_eq!(config.max_capacity, Some(12));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let config = Config::load_from(Path::new("/nonexistent/config.json")).unwrap();
        assert!(config.autoscaling_group_names.is_empty());
    }
}
