//! Thrust maps from static test-stand logs.
//!
//! Thrust is normalised to newtons, power is derived when voltage and current
//! are logged, and thrust is averaged per throttle setting and per rpm value.
//! A trimmed "clean" copy of the log is written alongside.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use thiserror::Error;

use crate::config::{ColumnAliases, PlotConfig};
use crate::core::loaders::{load_log_csv, ColumnKind, LogTable};
use crate::core::transforms::{add_power, ensure_thrust_newton, group_mean, TransformError};
use crate::core::writers::{output_path, write_columns_csv, write_log_table};

/// Optional pass-through columns for the clean table, kept under these exact names.
const CLEAN_EXTRA_COLUMNS: [&str; 3] = ["voltage_V", "current_A", "power_W"];

const TIME_COLUMN: &str = "time_s";

/// Errors specific to thrust map processing.
#[derive(Debug, Error)]
pub enum ThrustMapError {
    #[error(
        "no outputs were generated; expected some of: throttle_pct/throttle, rpm, thrust_N/thrust (or thrust_g/thrust_kgf)"
    )]
    NoOutputs,
}

/// A log with thrust normalised and the key columns located.
#[derive(Debug, Clone)]
pub struct NormalizedLog {
    pub table: LogTable,
    /// `thrust_N` when thrust could be found or converted.
    pub thrust: Option<String>,
    pub throttle: Option<String>,
    pub rpm: Option<String>,
    /// True if `power_W` was derived from voltage and current.
    pub derived_power: bool,
}

/// Summary of a thrust map run.
#[derive(Debug, Clone, Default)]
pub struct ThrustMapReport {
    pub throttle: Option<PathBuf>,
    pub rpm: Option<PathBuf>,
    pub clean: Option<PathBuf>,
    pub plots: Vec<PathBuf>,
}

impl ThrustMapReport {
    /// All CSV files written, in write order.
    pub fn outputs(&self) -> Vec<&Path> {
        [&self.throttle, &self.rpm, &self.clean]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Normalise thrust, derive power and locate throttle and rpm columns.
pub fn normalize_log(mut table: LogTable, aliases: &ColumnAliases) -> NormalizedLog {
    let thrust = ensure_thrust_newton(&mut table, aliases).map(str::to_string);
    let derived_power = add_power(&mut table, aliases);
    let throttle = table.pick_column(aliases.throttle.as_slice()).map(str::to_string);
    let rpm = table.pick_column(aliases.rpm.as_slice()).map(str::to_string);

    NormalizedLog {
        table,
        thrust,
        throttle,
        rpm,
        derived_power,
    }
}

/// Mean thrust per distinct `key` value, sorted by key.
///
/// Rows missing either value are ignored.
pub fn thrust_curve(
    table: &LogTable,
    key: &str,
    thrust: &str,
) -> std::result::Result<Option<(Vec<f64>, Vec<f64>)>, TransformError> {
    match (table.column(key), table.column(thrust)) {
        (Some(keys), Some(values)) => group_mean(keys, values).map(Some),
        _ => Ok(None),
    }
}

/// Columns kept in the clean table, in output order.
///
/// `time_s`, then the throttle, rpm and thrust columns that were found, then
/// `voltage_V`, `current_A` and `power_W` when present.
pub fn clean_columns(log: &NormalizedLog) -> Vec<String> {
    let located = [&log.throttle, &log.rpm, &log.thrust];

    let mut keep: Vec<String> = Vec::new();
    let candidates = std::iter::once(Some(TIME_COLUMN))
        .chain(located.iter().map(|c| c.as_deref()))
        .chain(CLEAN_EXTRA_COLUMNS.iter().map(|&c| Some(c)))
        .flatten();

    for name in candidates {
        if log.table.has_column(name) && !keep.iter().any(|k| k == name) {
            keep.push(name.to_string());
        }
    }
    keep
}

/// Where and how a curve table is written.
struct CurveTarget<'a> {
    outdir: &'a Path,
    name: &'a str,
    plot: Option<&'a PlotConfig>,
}

/// Write one `{key},thrust_N` curve. Returns `None` if a column is missing.
///
/// The key column keeps its source kind, so integer rpm stays integer.
fn write_curve(
    log: &NormalizedLog,
    key_col: Option<&str>,
    out_header: &str,
    stem: &str,
    target: &CurveTarget<'_>,
    plots: &mut Vec<PathBuf>,
) -> Result<Option<PathBuf>> {
    let (Some(key_col), Some(thrust_col)) = (key_col, log.thrust.as_deref()) else {
        return Ok(None);
    };
    let Some((keys, thrust)) = thrust_curve(&log.table, key_col, thrust_col)? else {
        return Ok(None);
    };

    let path = output_path(target.outdir, stem, target.name);
    let key_kind = log.table.column_kind(key_col).unwrap_or_default();
    write_columns_csv(
        &path,
        &[out_header, "thrust_N"],
        &[&keys, &thrust],
        &[key_kind, ColumnKind::Float],
    )?;
    info!("Wrote {} ({} points)", path.display(), keys.len());

    if let Some(plot_config) = target.plot {
        if let Some(png) =
            super::plot_preview(&path, &keys, &thrust, out_header, "thrust_N", plot_config)
        {
            plots.push(png);
        }
    }

    Ok(Some(path))
}

/// Process one test-stand log into the thrust map tables.
///
/// Writes `thrustmap_throttle_{name}.csv`, `thrustmap_rpm_{name}.csv` and
/// `thrustmap_clean_{name}.csv` for whichever columns are available. Fails
/// with [`ThrustMapError::NoOutputs`] when none could be produced.
pub fn process_thrust_map(
    input: &Path,
    outdir: &Path,
    name: &str,
    aliases: &ColumnAliases,
    plot: Option<&PlotConfig>,
) -> Result<ThrustMapReport> {
    let table = load_log_csv(input)
        .with_context(|| format!("Failed to load log: {}", input.display()))?;
    info!("Loaded {} rows from {}", table.num_rows(), input.display());

    let log = normalize_log(table, aliases);
    if log.derived_power {
        info!("Derived power_W from voltage and current");
    }

    let target = CurveTarget { outdir, name, plot };
    let mut report = ThrustMapReport::default();

    report.throttle = write_curve(
        &log,
        log.throttle.as_deref(),
        "throttle_pct",
        "thrustmap_throttle",
        &target,
        &mut report.plots,
    )?;
    if report.throttle.is_none() {
        warn!("Skipping throttle->thrust: missing columns (need throttle and thrust)");
    }

    report.rpm = write_curve(
        &log,
        log.rpm.as_deref(),
        "rpm",
        "thrustmap_rpm",
        &target,
        &mut report.plots,
    )?;
    if report.rpm.is_none() {
        warn!("Skipping rpm->thrust: missing columns (need rpm and thrust)");
    }

    let keep = clean_columns(&log);
    if !keep.is_empty() {
        let clean = log.table.select(keep.as_slice())?;
        let path = output_path(outdir, "thrustmap_clean", name);
        write_log_table(&path, &clean)?;
        info!("Wrote {}", path.display());
        report.clean = Some(path);
    }

    if report.outputs().is_empty() {
        return Err(ThrustMapError::NoOutputs.into());
    }

    Ok(report)
}
