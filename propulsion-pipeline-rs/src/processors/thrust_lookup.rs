//! Thrust lookup grid conversion.
//!
//! The lookup grid maps (battery voltage, desired force) to a motor command.
//! It is written out in long form for contour plots, and one voltage row is
//! inverted into a thrust-vs-throttle curve.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use thiserror::Error;

use crate::config::{LookupConfig, PlotConfig};
use crate::core::loaders::{load_lookup_grid, LookupGrid};
use crate::core::transforms::{
    invert_curve, melt_grid, slice_voltage_curve, throttle_percent, TransformError,
};
use crate::core::writers::{output_path, write_table_csv};

/// Errors specific to lookup conversion.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup grid has no voltage rows")]
    EmptyGrid,

    #[error("voltage row {0} has no finite command values")]
    EmptySlice(usize),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Options for slicing and normalising the lookup curve.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Voltage to slice at; the middle grid voltage when `None`.
    pub voltage: Option<f64>,
    /// Command mapped to 0 % throttle; the smallest command when `None`.
    pub min_cmd: Option<f64>,
    /// Command mapped to 100 % throttle; the largest command when `None`.
    pub max_cmd: Option<f64>,
}

/// Thrust against command at one voltage.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleCurve {
    /// Strictly increasing commands.
    pub cmd: Vec<f64>,
    pub throttle_pct: Vec<f64>,
    pub thrust_n: Vec<f64>,
    /// Grid voltage the curve was sliced at.
    pub voltage_v: f64,
}

/// Summary of a lookup conversion run.
#[derive(Debug, Clone)]
pub struct LookupReport {
    pub long_form: PathBuf,
    pub curve: PathBuf,
    pub plot: Option<PathBuf>,
    pub grid_size: usize,
    pub voltage_v: f64,
    pub curve_points: usize,
}

/// Slice the grid at a voltage and invert it into thrust per command.
pub fn throttle_curve_from_grid(
    grid: &LookupGrid,
    options: &LookupOptions,
    config: &LookupConfig,
) -> std::result::Result<ThrottleCurve, LookupError> {
    let slice = slice_voltage_curve(&grid.voltages, &grid.forces, &grid.cmd, options.voltage)
        .ok_or(LookupError::EmptyGrid)?;

    let (cmd, thrust_n) = invert_curve(&slice.cmd, &slice.forces)?;
    if cmd.is_empty() {
        return Err(LookupError::EmptySlice(slice.row));
    }

    let throttle_pct = throttle_percent(&cmd, options.min_cmd, options.max_cmd, config.min_span);

    Ok(ThrottleCurve {
        cmd,
        throttle_pct,
        thrust_n,
        voltage_v: slice.voltage_v,
    })
}

fn write_long_form(path: &Path, grid: &LookupGrid) -> Result<()> {
    let samples = melt_grid(&grid.voltages, &grid.forces, &grid.cmd);
    let voltage: Vec<f64> = samples.iter().map(|s| s.voltage_v).collect();
    let force: Vec<f64> = samples.iter().map(|s| s.force_n).collect();
    let cmd: Vec<f64> = samples.iter().map(|s| s.cmd).collect();

    write_table_csv(path, &["voltage_V", "force_N", "cmd"], &[&voltage, &force, &cmd])?;
    Ok(())
}

fn write_curve(path: &Path, curve: &ThrottleCurve) -> Result<()> {
    let voltage = vec![curve.voltage_v; curve.cmd.len()];
    write_table_csv(
        path,
        &["cmd", "throttle_pct", "thrust_N", "voltage_V"],
        &[&curve.cmd, &curve.throttle_pct, &curve.thrust_n, &voltage],
    )?;
    Ok(())
}

/// Convert a lookup grid file into long-form and 1D curve tables.
///
/// Writes `thrust_lookup_long_{name}.csv` and
/// `thrustmap_throttle_from_lookup_{name}.csv`.
pub fn process_thrust_lookup(
    input: &Path,
    outdir: &Path,
    name: &str,
    options: &LookupOptions,
    config: &LookupConfig,
    plot: Option<&PlotConfig>,
) -> Result<LookupReport> {
    let grid = load_lookup_grid(input)
        .with_context(|| format!("Failed to load lookup grid: {}", input.display()))?;
    info!(
        "Loaded {}x{} lookup grid ({:.2}-{:.2} V, {:.2}-{:.2} N)",
        grid.size(),
        grid.size(),
        grid.meta.min_voltage,
        grid.meta.max_voltage,
        grid.meta.min_force,
        grid.meta.max_force
    );

    let long_form = output_path(outdir, "thrust_lookup_long", name);
    write_long_form(&long_form, &grid)?;
    info!("Wrote {}", long_form.display());

    let curve = throttle_curve_from_grid(&grid, options, config)
        .with_context(|| format!("Failed to invert lookup curve from {}", input.display()))?;

    let curve_path = output_path(outdir, "thrustmap_throttle_from_lookup", name);
    write_curve(&curve_path, &curve)?;
    info!("Wrote {} (slice at {:.2} V)", curve_path.display(), curve.voltage_v);

    let plot = plot.and_then(|plot_config| {
        super::plot_preview(
            &curve_path,
            &curve.throttle_pct,
            &curve.thrust_n,
            "throttle_pct",
            "thrust_N",
            plot_config,
        )
    });

    Ok(LookupReport {
        long_form,
        curve: curve_path,
        plot,
        grid_size: grid.size(),
        voltage_v: curve.voltage_v,
        curve_points: curve.cmd.len(),
    })
}
