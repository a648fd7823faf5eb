//! Column derivations, unit conversions and aggregation helpers.
//!
//! Everything here works on plain `f64` slices or a [`LogTable`] and follows
//! the numeric conventions of the report tooling: `NaN` marks a missing
//! value and is skipped by aggregations, bins are closed on the right with
//! the lowest edge included.

use thiserror::Error;

use super::loaders::LogTable;
use crate::config::ColumnAliases;

/// Newtons per kilogram-force (standard gravity).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Newtons per gram-force.
pub const GRAM_FORCE: f64 = 9.80665e-3;

/// Canonical thrust column name after normalisation.
pub const THRUST_COLUMN: &str = "thrust_N";

/// Canonical electrical power column name.
pub const POWER_COLUMN: &str = "power_W";

/// Errors raised by numeric transforms.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("bin edges must be unique and increasing (range {lo}..{hi}, {bins} bins)")]
    NonUniqueBinEdges { lo: f64, hi: f64, bins: usize },

    #[error("number of bins must be at least 1")]
    ZeroBins,

    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Evenly spaced values over `[start, stop]`, endpoint included.
///
/// Matches `numpy.linspace`: the last value is exactly `stop`, and `n == 1`
/// yields `[start]`.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Mean of the non-`NaN` values, or `NaN` when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Quantile with linear interpolation between closest ranks, `NaN` skipped.
///
/// Returns `None` if there are no non-`NaN` values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Edges for `bins` equal-width bins spanning `[lo, hi]`.
///
/// # Errors
///
/// Fails when `bins` is zero or the edges would not be strictly increasing.
pub fn uniform_bin_edges(lo: f64, hi: f64, bins: usize) -> Result<Vec<f64>> {
    if bins == 0 {
        return Err(TransformError::ZeroBins);
    }
    let edges = linspace(lo, hi, bins + 1);
    let increasing = edges.windows(2).all(|w| w[0] < w[1]);
    if !increasing {
        return Err(TransformError::NonUniqueBinEdges { lo, hi, bins });
    }
    Ok(edges)
}

/// Bin index of `x` for sorted `edges`.
///
/// Bin 0 is `[e0, e1]`; every later bin `k` is `(ek, ek+1]`. Values outside
/// the edges, and `NaN`, fall in no bin.
pub fn bin_index(edges: &[f64], x: f64) -> Option<usize> {
    if edges.len() < 2 || x.is_nan() {
        return None;
    }
    let first = edges[0];
    let last = edges[edges.len() - 1];
    if x < first || x > last {
        return None;
    }
    let idx = edges.partition_point(|&e| e < x);
    Some(idx.max(1) - 1)
}

/// Group `values` by equal `keys` and average each group.
///
/// Pairs with a `NaN` on either side are dropped first. Output is sorted by
/// key ascending.
pub fn group_mean(keys: &[f64], values: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if keys.len() != values.len() {
        return Err(TransformError::LengthMismatch {
            left: keys.len(),
            right: values.len(),
        });
    }

    let mut pairs: Vec<(f64, f64)> = keys
        .iter()
        .zip(values)
        .filter(|(k, v)| !k.is_nan() && !v.is_nan())
        .map(|(&k, &v)| (k, v))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut out_keys = Vec::new();
    let mut out_means = Vec::new();
    let mut i = 0;
    while i < pairs.len() {
        let key = pairs[i].0;
        let mut sum = 0.0;
        let mut count = 0usize;
        while i < pairs.len() && pairs[i].0 == key {
            sum += pairs[i].1;
            count += 1;
            i += 1;
        }
        out_keys.push(key);
        out_means.push(sum / count as f64);
    }

    Ok((out_keys, out_means))
}

/// Normalise thrust to newtons under the canonical `thrust_N` name.
///
/// Looks for a newton column first (renamed in place), then grams, then
/// kilogram-force (converted into a new column). Returns the thrust column
/// name, or `None` if the table carries no recognisable thrust.
pub fn ensure_thrust_newton(table: &mut LogTable, aliases: &ColumnAliases) -> Option<&'static str> {
    if let Some(col) = table.pick_column(aliases.thrust_newton.as_slice()) {
        let col = col.to_string();
        if col != THRUST_COLUMN {
            table.rename_column(&col, THRUST_COLUMN);
        }
        return Some(THRUST_COLUMN);
    }

    let conversions = [
        (aliases.thrust_gram.as_slice(), GRAM_FORCE),
        (aliases.thrust_kgf.as_slice(), STANDARD_GRAVITY),
    ];
    for (names, factor) in conversions {
        let converted = table
            .pick_column(names)
            .and_then(|col| table.column(col))
            .map(|values| values.iter().map(|v| v * factor).collect::<Vec<_>>());
        if let Some(values) = converted {
            table.insert_column(THRUST_COLUMN, values);
            return Some(THRUST_COLUMN);
        }
    }

    None
}

/// Derive `power_W = V * I` when both a voltage and a current column exist.
///
/// Returns true if the power column was written.
pub fn add_power(table: &mut LogTable, aliases: &ColumnAliases) -> bool {
    let voltage = table.pick_column(aliases.voltage.as_slice()).and_then(|c| table.column(c));
    let current = table.pick_column(aliases.current.as_slice()).and_then(|c| table.column(c));

    let power = match (voltage, current) {
        (Some(v), Some(i)) => multiply(v, i),
        _ => return false,
    };
    table.insert_column(POWER_COLUMN, power);
    true
}

/// Element-wise product.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// Energy per distance in Wh/km from power [W] and speed [m/s].
///
/// Division follows IEEE rules: zero speed yields an infinity or `NaN`.
#[inline]
pub fn energy_wh_per_km(power_w: f64, speed_mps: f64) -> f64 {
    (power_w / speed_mps) * (1000.0 / 3600.0)
}

/// One row of a melted lookup grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub voltage_v: f64,
    pub force_n: f64,
    pub cmd: f64,
}

/// Reshape a voltage x force grid into long form, row-major.
pub fn melt_grid(voltages: &[f64], forces: &[f64], cmd: &[Vec<f64>]) -> Vec<GridSample> {
    let mut out = Vec::with_capacity(voltages.len() * forces.len());
    for (&voltage_v, row) in voltages.iter().zip(cmd) {
        for (&force_n, &c) in forces.iter().zip(row) {
            out.push(GridSample {
                voltage_v,
                force_n,
                cmd: c,
            });
        }
    }
    out
}

/// Pick the grid row closest to `target` (or the middle row when `None`).
///
/// Returns `(row index, selected voltage)`. Ties resolve to the lowest index.
pub fn select_voltage_row(voltages: &[f64], target: Option<f64>) -> Option<(usize, f64)> {
    if voltages.is_empty() {
        return None;
    }
    let idx = match target {
        None => voltages.len() / 2,
        Some(t) => {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (i, v) in voltages.iter().enumerate() {
                let dist = (v - t).abs();
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            best
        }
    };
    Some((idx, voltages[idx]))
}

/// One voltage row of a lookup grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageSlice {
    pub row: usize,
    pub voltage_v: f64,
    pub forces: Vec<f64>,
    pub cmd: Vec<f64>,
}

/// Copy out the force axis and command row at the selected voltage.
pub fn slice_voltage_curve(
    voltages: &[f64],
    forces: &[f64],
    cmd: &[Vec<f64>],
    target: Option<f64>,
) -> Option<VoltageSlice> {
    let (row, voltage_v) = select_voltage_row(voltages, target)?;
    Some(VoltageSlice {
        row,
        voltage_v,
        forces: forces.to_vec(),
        cmd: cmd.get(row)?.clone(),
    })
}

/// Invert `cmd(force)` into `force(cmd)`.
///
/// Sorts by command and averages forces sharing the same command value, so
/// the returned commands are strictly increasing.
pub fn invert_curve(cmd: &[f64], force: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    group_mean(cmd, force)
}

/// Scale commands to a 0-100 % throttle.
///
/// `min_cmd`/`max_cmd` default to the extremes of `cmd`; the span is floored
/// at `min_span` to avoid dividing by zero.
pub fn throttle_percent(
    cmd: &[f64],
    min_cmd: Option<f64>,
    max_cmd: Option<f64>,
    min_span: f64,
) -> Vec<f64> {
    let cmin = min_cmd.unwrap_or_else(|| cmd.iter().copied().fold(f64::INFINITY, f64::min));
    let cmax = max_cmd.unwrap_or_else(|| cmd.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    let span = (cmax - cmin).max(min_span);
    cmd.iter().map(|c| (c - cmin) / span * 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 7.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        let v = linspace(0.1, 0.7, 7);
        assert_eq!(*v.last().unwrap(), 0.7);
    }

    #[test]
    fn test_nan_mean() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN]).is_nan());
        assert!(nan_mean(&[]).is_nan());
    }

    #[test]
    fn test_quantile_linear() {
        let values = [4.0, 1.0, f64::NAN, 3.0, 2.0, 5.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(5.0));
        assert_eq!(quantile(&values, 0.5), Some(3.0));
        assert!(approx_eq(quantile(&values, 0.05).unwrap(), 1.2));
        assert!(approx_eq(quantile(&values, 0.95).unwrap(), 4.8));
        assert_eq!(quantile(&[f64::NAN], 0.5), None);
    }

    #[test]
    fn test_uniform_bin_edges() {
        let edges = uniform_bin_edges(0.0, 10.0, 4).unwrap();
        assert_eq!(edges, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(uniform_bin_edges(0.0, 1.0, 0), Err(TransformError::ZeroBins));
        assert!(matches!(
            uniform_bin_edges(2.0, 2.0, 3),
            Err(TransformError::NonUniqueBinEdges { .. })
        ));
    }

    #[test]
    fn test_bin_index_include_lowest() {
        let edges = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(bin_index(&edges, 0.0), Some(0));
        assert_eq!(bin_index(&edges, 0.5), Some(0));
        assert_eq!(bin_index(&edges, 1.0), Some(0));
        assert_eq!(bin_index(&edges, 1.0001), Some(1));
        assert_eq!(bin_index(&edges, 3.0), Some(2));
        assert_eq!(bin_index(&edges, -0.1), None);
        assert_eq!(bin_index(&edges, 3.1), None);
        assert_eq!(bin_index(&edges, f64::NAN), None);
    }

    #[test]
    fn test_group_mean_sorts_and_averages() {
        let keys = [30.0, 10.0, 30.0, f64::NAN, 20.0, 10.0];
        let values = [3.0, 1.0, 5.0, 100.0, f64::NAN, 2.0];
        let (k, v) = group_mean(&keys, &values).unwrap();
        assert_eq!(k, vec![10.0, 30.0]);
        assert_eq!(v, vec![1.5, 4.0]);
    }

    #[test]
    fn test_group_mean_orders_negative_keys() {
        let (k, v) = group_mean(&[1.0, -1.0, 0.0, -1.0], &[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(k, vec![-1.0, 0.0, 1.0]);
        assert_eq!(v, vec![1.5, 3.0, 4.0]);
    }

    #[test]
    fn test_group_mean_length_mismatch() {
        let result = group_mean(&[1.0], &[1.0, 2.0]);
        assert_eq!(result, Err(TransformError::LengthMismatch { left: 1, right: 2 }));
    }

    #[test]
    fn test_ensure_thrust_newton_renames_alias() {
        let aliases = ColumnAliases::default();
        let mut table = LogTable::from_columns(vec![("force_N", vec![1.0, 2.0])]);
        assert_eq!(ensure_thrust_newton(&mut table, &aliases), Some("thrust_N"));
        assert_eq!(table.column_names(), vec!["thrust_N"]);
    }

    #[test]
    fn test_ensure_thrust_newton_converts_grams() {
        let aliases = ColumnAliases::default();
        let mut table = LogTable::from_columns(vec![("thrust_g", vec![1000.0, f64::NAN])]);
        assert_eq!(ensure_thrust_newton(&mut table, &aliases), Some("thrust_N"));
        let thrust = table.column("thrust_N").unwrap();
        assert!(approx_eq(thrust[0], 9.80665));
        assert!(thrust[1].is_nan());
        assert!(table.has_column("thrust_g"));
    }

    #[test]
    fn test_ensure_thrust_newton_converts_kgf() {
        let aliases = ColumnAliases::default();
        let mut table = LogTable::from_columns(vec![("force_kgf", vec![2.0])]);
        ensure_thrust_newton(&mut table, &aliases);
        assert!(approx_eq(table.column("thrust_N").unwrap()[0], 19.6133));
    }

    #[test]
    fn test_ensure_thrust_newton_missing() {
        let aliases = ColumnAliases::default();
        let mut table = LogTable::from_columns(vec![("rpm", vec![2.0])]);
        assert_eq!(ensure_thrust_newton(&mut table, &aliases), None);
    }

    #[test]
    fn test_add_power() {
        let aliases = ColumnAliases::default();
        let mut table = LogTable::from_columns(vec![
            ("battery_V", vec![12.0, 11.0]),
            ("current", vec![2.0, f64::NAN]),
        ]);
        assert!(add_power(&mut table, &aliases));
        let power = table.column("power_W").unwrap();
        assert_eq!(power[0], 24.0);
        assert!(power[1].is_nan());

        let mut no_current = LogTable::from_columns(vec![("voltage_V", vec![12.0])]);
        assert!(!add_power(&mut no_current, &aliases));
        assert!(!no_current.has_column("power_W"));
    }

    #[test]
    fn test_energy_wh_per_km() {
        assert!(approx_eq(energy_wh_per_km(360.0, 10.0), 10.0));
        assert!(energy_wh_per_km(100.0, 0.0).is_infinite());
    }

    #[test]
    fn test_melt_grid_row_major() {
        let rows = melt_grid(&[10.0, 20.0], &[1.0, 2.0], &[vec![0.1, 0.2], vec![0.3, 0.4]]);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], GridSample { voltage_v: 10.0, force_n: 2.0, cmd: 0.2 });
        assert_eq!(rows[2], GridSample { voltage_v: 20.0, force_n: 1.0, cmd: 0.3 });
    }

    #[test]
    fn test_select_voltage_row() {
        let v = [10.0, 12.0, 14.0, 16.0];
        assert_eq!(select_voltage_row(&v, None), Some((2, 14.0)));
        assert_eq!(select_voltage_row(&v, Some(12.9)), Some((1, 12.0)));
        assert_eq!(select_voltage_row(&v, Some(13.0)), Some((1, 12.0)));
        assert_eq!(select_voltage_row(&v, Some(100.0)), Some((3, 16.0)));
        assert_eq!(select_voltage_row(&[], None), None);
    }

    #[test]
    fn test_slice_voltage_curve() {
        let cmd = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let slice = slice_voltage_curve(&[10.0, 20.0], &[0.0, 5.0], &cmd, Some(19.0)).unwrap();
        assert_eq!(slice.row, 1);
        assert_eq!(slice.voltage_v, 20.0);
        assert_eq!(slice.forces, vec![0.0, 5.0]);
        assert_eq!(slice.cmd, vec![3.0, 4.0]);
    }

    #[test]
    fn test_invert_curve_averages_duplicates() {
        let cmd = [0.5, 0.1, 0.5, 0.9];
        let force = [2.0, 0.0, 4.0, 8.0];
        let (c, f) = invert_curve(&cmd, &force).unwrap();
        assert_eq!(c, vec![0.1, 0.5, 0.9]);
        assert_eq!(f, vec![0.0, 3.0, 8.0]);
    }

    #[test]
    fn test_throttle_percent() {
        let pct = throttle_percent(&[1000.0, 1500.0, 2000.0], None, None, 1e-9);
        assert_eq!(pct, vec![0.0, 50.0, 100.0]);

        let pct = throttle_percent(&[1500.0], Some(1000.0), Some(2000.0), 1e-9);
        assert_eq!(pct, vec![50.0]);

        let flat = throttle_percent(&[5.0, 5.0], None, None, 1e-9);
        assert_eq!(flat, vec![0.0, 0.0]);
    }
}
