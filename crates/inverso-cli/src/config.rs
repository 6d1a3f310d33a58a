//! TOML configuration deserialisation for simulation jobs.

use std::path::Path;

use anyhow::{Context, Result};
use inverso_geometry::LayoutSpec;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub device: LayoutSpec,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Simulation parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    /// Wavelengths to simulate; the device's own list when omitted.
    #[serde(default)]
    pub wavelengths: Option<WavelengthSpec>,
    /// Ports to excite, sorted ascending.
    #[serde(default = "default_excite_ports")]
    pub excite_ports: Vec<usize>,
    /// Worker cap; one worker per task when omitted.
    #[serde(default)]
    pub max_parallelism: Option<usize>,
    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,
    #[serde(default)]
    pub design: DesignConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wavelengths: None,
            excite_ports: default_excite_ports(),
            max_parallelism: None,
            residual_tolerance: default_residual_tolerance(),
            design: DesignConfig::default(),
        }
    }
}

fn default_excite_ports() -> Vec<usize> {
    vec![0]
}
fn default_residual_tolerance() -> f64 {
    1e-6
}

/// Wavelength specification: either a range or explicit list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

impl WavelengthSpec {
    pub fn values(&self) -> Vec<f64> {
        match self {
            WavelengthSpec::Range { range, points } => {
                let [start, end] = *range;
                (0..*points)
                    .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                    .collect()
            }
            WavelengthSpec::List { values } => values.clone(),
        }
    }
}

/// Where the design variable comes from.
#[derive(Debug, Deserialize)]
pub struct DesignConfig {
    /// Uniform density filling the design variable (default: 1.0).
    #[serde(default = "default_fill")]
    pub fill: f64,
    /// CSV file with one row per x cell; overrides `fill`.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            fill: default_fill(),
            file: None,
        }
    }
}

fn default_fill() -> f64 {
    1.0
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save S-parameters as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_sparams: bool,
    /// Whether to also save S-parameters as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Whether to save the Ez field of every simulation (default: false).
    #[serde(default)]
    pub save_fields: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_sparams: true,
            save_json: false,
            save_fields: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("parsing job file {}", path.display()))?;
    Ok(config)
}
