//! Configuration types for the propulsion data pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where output tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output directory when `--outdir` is not given
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Settings for speed-binned efficiency tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyConfig {
    /// Number of speed bins
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Quantile of speed used as the lowest bin edge
    #[serde(default = "default_lower_quantile")]
    pub lower_quantile: f64,

    /// Quantile of speed used as the highest bin edge
    #[serde(default = "default_upper_quantile")]
    pub upper_quantile: f64,
}

fn default_bins() -> usize {
    12
}

fn default_lower_quantile() -> f64 {
    0.05
}

fn default_upper_quantile() -> f64 {
    0.95
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            lower_quantile: default_lower_quantile(),
            upper_quantile: default_upper_quantile(),
        }
    }
}

/// Accepted column names, in priority order, for each logged quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAliases {
    /// Thrust already in newtons
    #[serde(default = "default_thrust_newton")]
    pub thrust_newton: Vec<String>,

    /// Thrust in grams-force
    #[serde(default = "default_thrust_gram")]
    pub thrust_gram: Vec<String>,

    /// Thrust in kilograms-force
    #[serde(default = "default_thrust_kgf")]
    pub thrust_kgf: Vec<String>,

    #[serde(default = "default_voltage")]
    pub voltage: Vec<String>,

    #[serde(default = "default_current")]
    pub current: Vec<String>,

    #[serde(default = "default_throttle")]
    pub throttle: Vec<String>,

    #[serde(default = "default_rpm")]
    pub rpm: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_thrust_newton() -> Vec<String> {
    names(&["thrust_N", "thrust", "force_N"])
}

fn default_thrust_gram() -> Vec<String> {
    names(&["thrust_g", "force_g"])
}

fn default_thrust_kgf() -> Vec<String> {
    names(&["thrust_kgf", "force_kgf"])
}

fn default_voltage() -> Vec<String> {
    names(&["voltage_V", "voltage", "V", "battery_V"])
}

fn default_current() -> Vec<String> {
    names(&["current_A", "current", "I"])
}

fn default_throttle() -> Vec<String> {
    names(&["throttle_pct", "throttle_percent", "throttle"])
}

fn default_rpm() -> Vec<String> {
    names(&["rpm", "motor_rpm"])
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            thrust_newton: default_thrust_newton(),
            thrust_gram: default_thrust_gram(),
            thrust_kgf: default_thrust_kgf(),
            voltage: default_voltage(),
            current: default_current(),
            throttle: default_throttle(),
            rpm: default_rpm(),
        }
    }
}

/// Settings for lookup-grid conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Smallest command span used when normalising throttle
    #[serde(default = "default_min_span")]
    pub min_span: f64,
}

fn default_min_span() -> f64 {
    1e-9
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            min_span: default_min_span(),
        }
    }
}

/// PNG plot dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_plot_width")]
    pub width: u32,

    #[serde(default = "default_plot_height")]
    pub height: u32,
}

fn default_plot_width() -> u32 {
    1280
}

fn default_plot_height() -> u32 {
    720
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_plot_width(),
            height: default_plot_height(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub efficiency: EfficiencyConfig,

    #[serde(default)]
    pub columns: ColumnAliases,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_column_aliases() {
        let aliases = ColumnAliases::default();
        assert_eq!(aliases.thrust_newton, vec!["thrust_N", "thrust", "force_N"]);
        assert_eq!(aliases.voltage[0], "voltage_V");
        assert_eq!(aliases.rpm, vec!["rpm", "motor_rpm"]);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.output.dir, PathBuf::from("data"));
        assert_eq!(config.efficiency.bins, 12);
        assert_eq!(config.efficiency.lower_quantile, 0.05);
        assert_eq!(config.lookup.min_span, 1e-9);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "efficiency:\n  bins: 8\ncolumns:\n  rpm: [erpm]\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.efficiency.bins, 8);
        assert_eq!(config.efficiency.upper_quantile, 0.95);
        assert_eq!(config.columns.rpm, vec!["erpm"]);
        assert_eq!(config.columns.current, vec!["current_A", "current", "I"]);
    }

    #[test]
    fn test_yaml_round_trip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.output.dir = PathBuf::from("report/data");
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.output.dir, PathBuf::from("report/data"));
        assert_eq!(loaded.plot.width, 1280);
    }
}
