//! CSV writers for report tables.
//!
//! Output follows the conventions the plotting side expects:
//! - header row with the exact column names
//! - `NaN` written as an empty cell, infinities as `inf` / `-inf`
//! - whole numbers keep a trailing `.0`, others use the shortest round-trip form
//! - integer columns are written without a decimal point

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::loaders::{ColumnKind, LogTable};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Header and column counts differ.
    #[error("'{path}': {headers} headers for {columns} columns")]
    HeaderMismatch {
        path: String,
        headers: usize,
        columns: usize,
    },

    /// Columns of unequal length.
    #[error("'{path}': column '{column}' has {len} rows, expected {expected}")]
    LengthMismatch {
        path: String,
        column: String,
        len: usize,
        expected: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Output file path following the `{stem}_{name}.csv` convention.
pub fn output_path(dir: &Path, stem: &str, name: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", stem, name))
}

/// Format a float cell.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    let abs = value.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Two-digit signed exponent, e.g. 1.5e-05
        let sci = format!("{:e}", value);
        if let Some((mantissa, exp)) = sci.split_once('e') {
            if let Ok(exp) = exp.parse::<i32>() {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exp.abs());
            }
        }
        return sci;
    }

    let plain = value.to_string();
    if plain.contains('.') {
        plain
    } else {
        format!("{}.0", plain)
    }
}

/// Format a cell of an integer column. Non-integral values fall back to
/// [`format_float`].
pub fn format_integer(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.2e18 {
        format!("{}", value as i64)
    } else {
        format_float(value)
    }
}

fn format_cell(value: f64, kind: ColumnKind) -> String {
    match kind {
        ColumnKind::Float => format_float(value),
        ColumnKind::Integer => format_integer(value),
    }
}

/// Write named float columns to a CSV file.
///
/// Creates parent directories as needed. All columns must have the same
/// length and there must be one header per column.
///
/// # Example
///
/// ```no_run
/// use propulsion_pipeline::core::writers::write_table_csv;
/// use std::path::Path;
///
/// let throttle = [10.0, 20.0];
/// let thrust = [1.2, 2.9];
/// write_table_csv(
///     Path::new("data/thrustmap_throttle_motorA.csv"),
///     &["throttle_pct", "thrust_N"],
///     &[&throttle, &thrust],
/// )
/// .unwrap();
/// ```
pub fn write_table_csv(path: &Path, headers: &[&str], columns: &[&[f64]]) -> Result<()> {
    write_columns_csv(path, headers, columns, &[])
}

/// Write named columns to a CSV file, formatting each by its [`ColumnKind`].
///
/// Columns without an entry in `kinds` are written as floats.
pub fn write_columns_csv(
    path: &Path,
    headers: &[&str],
    columns: &[&[f64]],
    kinds: &[ColumnKind],
) -> Result<()> {
    let path_str = path.display().to_string();

    if headers.len() != columns.len() {
        return Err(WriteError::HeaderMismatch {
            path: path_str,
            headers: headers.len(),
            columns: columns.len(),
        });
    }

    let num_rows = columns.first().map_or(0, |c| c.len());
    for (header, column) in headers.iter().zip(columns) {
        if column.len() != num_rows {
            return Err(WriteError::LengthMismatch {
                path: path_str,
                column: header.to_string(),
                len: column.len(),
                expected: num_rows,
            });
        }
    }

    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    csv_writer
        .write_record(headers)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    let mut row = Vec::with_capacity(columns.len());
    for i in 0..num_rows {
        row.clear();
        row.extend(
            columns
                .iter()
                .enumerate()
                .map(|(j, c)| format_cell(c[i], kinds.get(j).copied().unwrap_or_default())),
        );
        csv_writer
            .write_record(&row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write every column of a [`LogTable`] in table order.
pub fn write_log_table(path: &Path, table: &LogTable) -> Result<()> {
    let headers: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    let columns: Vec<&[f64]> = table.columns().iter().map(|c| c.values.as_slice()).collect();
    let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind).collect();
    write_columns_csv(path, &headers, &columns, &kinds)
}
