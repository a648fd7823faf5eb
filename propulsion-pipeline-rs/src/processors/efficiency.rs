//! Speed-binned efficiency tables from flight logs.
//!
//! Rows are binned by airspeed between two speed quantiles, then power,
//! summed thrust and speed are averaged per bin. When power is known the
//! energy spent per kilometre is added.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::config::{EfficiencyConfig, PlotConfig};
use crate::core::loaders::{load_log_csv, LogTable};
use crate::core::transforms::{
    bin_index, energy_wh_per_km, multiply, quantile, uniform_bin_edges, TransformError,
    POWER_COLUMN,
};
use crate::core::writers::{output_path, write_log_table};

pub const SPEED_COLUMN: &str = "speed_mps";
pub const THRUST_SUM_COLUMN: &str = "thrust_sum_N";
pub const ENERGY_COLUMN: &str = "energy_Wh_per_km";

const VOLTAGE_COLUMN: &str = "voltage_V";
const CURRENT_COLUMN: &str = "current_A";

/// Errors specific to efficiency processing.
#[derive(Debug, Error)]
pub enum EfficiencyError {
    #[error(
        "input must contain speed_mps and either power_W or voltage_V,current_A; optionally thrust_sum_N"
    )]
    MissingColumns,

    #[error("column speed_mps has no numeric values")]
    NoSpeedValues,

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Summary of an efficiency run.
#[derive(Debug, Clone)]
pub struct EfficiencyReport {
    pub output: PathBuf,
    pub plot: Option<PathBuf>,
    /// Speed range covered by the bins.
    pub speed_range: (f64, f64),
    pub bins: usize,
    /// Number of non-empty bins written.
    pub rows: usize,
}

/// Bin a log by speed and average each bin.
///
/// Derives `power_W` from `voltage_V` and `current_A` when both are present.
/// The returned table has columns `speed_mps`, then `power_W` and
/// `thrust_sum_N` when available, then `energy_Wh_per_km` when power is
/// available. Bins with any missing average are dropped.
pub fn compute_efficiency(
    table: &mut LogTable,
    config: &EfficiencyConfig,
) -> std::result::Result<(LogTable, (f64, f64)), EfficiencyError> {
    if let (Some(v), Some(i)) = (table.column(VOLTAGE_COLUMN), table.column(CURRENT_COLUMN)) {
        let power = multiply(v, i);
        table.insert_column(POWER_COLUMN, power);
    }

    let has_power = table.has_column(POWER_COLUMN);
    let has_thrust = table.has_column(THRUST_SUM_COLUMN);
    let speed = match table.column(SPEED_COLUMN) {
        Some(speed) if has_power || has_thrust => speed,
        _ => return Err(EfficiencyError::MissingColumns),
    };

    let lo = quantile(speed, config.lower_quantile).ok_or(EfficiencyError::NoSpeedValues)?;
    let hi = quantile(speed, config.upper_quantile).ok_or(EfficiencyError::NoSpeedValues)?;
    let edges = uniform_bin_edges(lo, hi, config.bins)?;
    debug!("Speed bin edges: {:?}", edges);

    let mut agg_names = vec![SPEED_COLUMN];
    if has_power {
        agg_names.push(POWER_COLUMN);
    }
    if has_thrust {
        agg_names.push(THRUST_SUM_COLUMN);
    }
    let agg_columns: Vec<&[f64]> = agg_names
        .iter()
        .filter_map(|name| table.column(name))
        .collect();

    // sums[bin][col], counts[bin][col]
    let mut sums = vec![vec![0.0; agg_columns.len()]; config.bins];
    let mut counts = vec![vec![0usize; agg_columns.len()]; config.bins];

    for (row, &s) in speed.iter().enumerate() {
        let Some(bin) = bin_index(&edges, s) else {
            continue;
        };
        for (col, values) in agg_columns.iter().enumerate() {
            let v = values[row];
            if !v.is_nan() {
                sums[bin][col] += v;
                counts[bin][col] += 1;
            }
        }
    }

    let mut out: Vec<Vec<f64>> = (0..agg_columns.len())
        .map(|_| Vec::with_capacity(config.bins))
        .collect();
    for (bin_sums, bin_counts) in sums.iter().zip(&counts) {
        if bin_counts.iter().any(|&c| c == 0) {
            continue;
        }
        for (col, column) in out.iter_mut().enumerate() {
            column.push(bin_sums[col] / bin_counts[col] as f64);
        }
    }

    let mut columns: Vec<(&str, Vec<f64>)> = agg_names.iter().copied().zip(out).collect();

    if has_power {
        let energy: Vec<f64> = columns[0]
            .1
            .iter()
            .zip(&columns[1].1)
            .map(|(&speed, &power)| energy_wh_per_km(power, speed))
            .collect();
        columns.push((ENERGY_COLUMN, energy));
    }

    Ok((LogTable::from_columns(columns), (lo, hi)))
}

/// Process one flight log into `efficiency_{name}.csv`.
pub fn process_efficiency(
    input: &Path,
    outdir: &Path,
    name: &str,
    config: &EfficiencyConfig,
    plot: Option<&PlotConfig>,
) -> Result<EfficiencyReport> {
    let mut table = load_log_csv(input)
        .with_context(|| format!("Failed to load log: {}", input.display()))?;
    info!("Loaded {} rows from {}", table.num_rows(), input.display());

    let (binned, speed_range) = compute_efficiency(&mut table, config)
        .with_context(|| format!("Failed to bin {} by speed", input.display()))?;

    let output = output_path(outdir, "efficiency", name);
    write_log_table(&output, &binned)?;
    info!("Wrote {}", output.display());

    let plot = plot.and_then(|plot_config| {
        let speed = binned.column(SPEED_COLUMN)?;
        let (y_name, y) = [POWER_COLUMN, THRUST_SUM_COLUMN]
            .iter()
            .find_map(|&c| binned.column(c).map(|values| (c, values)))?;
        super::plot_preview(&output, speed, y, SPEED_COLUMN, y_name, plot_config)
    });

    Ok(EfficiencyReport {
        output,
        plot,
        speed_range,
        bins: config.bins,
        rows: binned.num_rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bins: usize) -> EfficiencyConfig {
        EfficiencyConfig {
            bins,
            lower_quantile: 0.0,
            upper_quantile: 1.0,
        }
    }

    #[test]
    fn test_compute_efficiency_with_power() {
        let mut table = LogTable::from_columns(vec![
            ("speed_mps", vec![10.0, 12.0, 18.0, 20.0]),
            ("voltage_V", vec![10.0, 10.0, 10.0, 10.0]),
            ("current_A", vec![36.0, 36.0, 72.0, 72.0]),
        ]);

        let (binned, range) = compute_efficiency(&mut table, &config(2)).unwrap();

        assert_eq!(range, (10.0, 20.0));
        assert_eq!(
            binned.column_names(),
            vec!["speed_mps", "power_W", "energy_Wh_per_km"]
        );
        assert_eq!(binned.column("speed_mps").unwrap(), &[11.0, 19.0]);
        assert_eq!(binned.column("power_W").unwrap(), &[360.0, 720.0]);
        let energy = binned.column("energy_Wh_per_km").unwrap();
        assert!((energy[0] - 360.0 / 11.0 / 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_compute_efficiency_drops_empty_bins() {
        let mut table = LogTable::from_columns(vec![
            ("speed_mps", vec![0.0, 1.0, 9.0, 10.0]),
            ("thrust_sum_N", vec![1.0, 3.0, 5.0, 7.0]),
        ]);

        let (binned, _) = compute_efficiency(&mut table, &config(5)).unwrap();

        assert_eq!(binned.column_names(), vec!["speed_mps", "thrust_sum_N"]);
        assert_eq!(binned.column("speed_mps").unwrap(), &[0.5, 9.5]);
        assert_eq!(binned.column("thrust_sum_N").unwrap(), &[2.0, 6.0]);
    }

    #[test]
    fn test_compute_efficiency_drops_bin_with_missing_average() {
        let mut table = LogTable::from_columns(vec![
            ("speed_mps", vec![0.0, 10.0]),
            ("power_W", vec![f64::NAN, 100.0]),
        ]);

        let (binned, _) = compute_efficiency(&mut table, &config(2)).unwrap();

        assert_eq!(binned.column("speed_mps").unwrap(), &[10.0]);
    }

    #[test]
    fn test_compute_efficiency_excludes_outliers_by_quantile() {
        let mut speeds: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        speeds.push(1000.0);
        let power = vec![50.0; speeds.len()];
        let mut table =
            LogTable::from_columns(vec![("speed_mps", speeds), ("power_W", power)]);

        let (binned, (lo, hi)) =
            compute_efficiency(&mut table, &EfficiencyConfig::default()).unwrap();

        assert!(lo > 0.0 && hi < 1000.0);
        assert!(binned.column("speed_mps").unwrap().iter().all(|&s| s >= lo && s <= hi));
    }

    #[test]
    fn test_compute_efficiency_missing_columns() {
        let mut table = LogTable::from_columns(vec![("speed_mps", vec![1.0, 2.0])]);
        let result = compute_efficiency(&mut table, &config(2));
        assert!(matches!(result, Err(EfficiencyError::MissingColumns)));

        let mut table = LogTable::from_columns(vec![("power_W", vec![1.0, 2.0])]);
        let result = compute_efficiency(&mut table, &config(2));
        assert!(matches!(result, Err(EfficiencyError::MissingColumns)));
    }

    #[test]
    fn test_compute_efficiency_constant_speed() {
        let mut table = LogTable::from_columns(vec![
            ("speed_mps", vec![5.0, 5.0, 5.0]),
            ("power_W", vec![1.0, 2.0, 3.0]),
        ]);
        let result = compute_efficiency(&mut table, &config(3));
        assert!(matches!(
            result,
            Err(EfficiencyError::Transform(TransformError::NonUniqueBinEdges { .. }))
        ));
    }

    #[test]
    fn test_compute_efficiency_no_speed_values() {
        let mut table = LogTable::from_columns(vec![
            ("speed_mps", vec![f64::NAN]),
            ("power_W", vec![1.0]),
        ]);
        let result = compute_efficiency(&mut table, &config(3));
        assert!(matches!(result, Err(EfficiencyError::NoSpeedValues)));
    }
}
