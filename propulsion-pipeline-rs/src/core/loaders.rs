//! Data loaders for propulsion test logs and thrust lookup grids.
//!
//! This module provides parsers for:
//! - Raw test-stand / flight log CSV files (header row, numeric columns)
//! - Thrust lookup grid CSV files (meta row followed by an N x N command grid)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::transforms::linspace;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Invalid lookup grid: {0}")]
    InvalidGrid(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// How a column's values were written in the source file.
///
/// A column is `Integer` only when every cell held a whole number; any empty
/// or fractional cell makes it `Float`. Integer columns are written back
/// without a decimal point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnKind {
    #[default]
    Float,
    Integer,
}

/// A named numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
    pub kind: ColumnKind,
}

/// Column-oriented numeric table loaded from a log CSV.
///
/// Cells that are empty or not parseable as numbers are stored as `NaN`,
/// so downstream aggregation can skip them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogTable {
    columns: Vec<Column>,
}

impl LogTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, values)` pairs, keeping their order.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, values)| Column {
                    name: name.into(),
                    values,
                    kind: ColumnKind::Float,
                })
                .collect(),
        }
    }

    /// Marks the named column with `kind`; a missing column is ignored.
    pub fn with_kind(mut self, name: &str, kind: ColumnKind) -> Self {
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == name) {
            col.kind = kind;
        }
        self
    }

    /// Returns the number of data rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Returns the number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of the named column, if present.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Kind of the named column, if present.
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    /// Returns the first alias that names an existing column.
    pub fn pick_column<'a, S: AsRef<str>>(&self, aliases: &'a [S]) -> Option<&'a str> {
        aliases
            .iter()
            .map(|a| a.as_ref())
            .find(|a| self.has_column(a))
    }

    /// Inserts a float column, replacing the values of an existing column of
    /// the same name in place, or appending it otherwise.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                existing.values = values;
                existing.kind = ColumnKind::Float;
            }
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
                kind: ColumnKind::Float,
            }),
        }
    }

    /// Renames a column. Returns false if `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|c| c.name == from) {
            Some(col) => {
                col.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Returns a new table with the requested columns in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<LogTable> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let col = self
                .columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))?;
            columns.push(col.clone());
        }
        Ok(LogTable { columns })
    }
}

/// Parses a CSV cell as a float, mapping empty or invalid cells to `NaN`.
fn parse_cell(cell: &str) -> f64 {
    let cell = cell.trim();
    if cell.is_empty() {
        return f64::NAN;
    }
    cell.parse().unwrap_or(f64::NAN)
}

fn is_integer_cell(cell: &str) -> bool {
    cell.trim().parse::<i64>().is_ok()
}

/// Load a raw log CSV into a [`LogTable`].
///
/// The first row names the columns. Short records are padded with `NaN`,
/// extra trailing fields are ignored. A column whose cells are all whole
/// numbers is marked [`ColumnKind::Integer`].
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid CSV, or has no
/// data rows.
pub fn load_log_csv<P: AsRef<Path>>(path: P) -> Result<LogTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let mut values: Vec<Vec<f64>> = (0..headers.len()).map(|_| Vec::new()).collect();
    let mut integer = vec![true; headers.len()];

    for result in reader.records() {
        let record = result?;
        for (i, column) in values.iter_mut().enumerate() {
            let cell = record.get(i);
            integer[i] &= cell.is_some_and(is_integer_cell);
            column.push(cell.map_or(f64::NAN, parse_cell));
        }
    }

    if values[0].is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(LogTable {
        columns: headers
            .into_iter()
            .zip(values)
            .zip(integer)
            .map(|((name, values), integer)| Column {
                name,
                values,
                kind: if integer { ColumnKind::Integer } else { ColumnKind::Float },
            })
            .collect(),
    })
}

/// Header row of a thrust lookup grid file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupMeta {
    /// Grid size (rows and columns).
    pub size: usize,
    pub min_force: f64,
    pub max_force: f64,
    pub min_voltage: f64,
    pub max_voltage: f64,
}

/// Thrust lookup table: a command value for every (voltage, force) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupGrid {
    /// Voltage axis, one entry per grid row.
    pub voltages: Vec<f64>,
    /// Force axis in newtons, one entry per grid column.
    pub forces: Vec<f64>,
    /// Command values. Shape: [voltages.len()][forces.len()].
    pub cmd: Vec<Vec<f64>>,
    pub meta: LookupMeta,
}

impl LookupGrid {
    /// Builds a grid from its meta row and command rows, deriving both axes.
    pub fn from_parts(meta: LookupMeta, cmd: Vec<Vec<f64>>) -> Self {
        Self {
            voltages: linspace(meta.min_voltage, meta.max_voltage, meta.size),
            forces: linspace(meta.min_force, meta.max_force, meta.size),
            cmd,
            meta,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.meta.size
    }
}

fn parse_grid_row(record: &csv::StringRecord, line: usize) -> Result<Vec<f64>> {
    record
        .iter()
        .map(|field| {
            let field = field.trim();
            field.parse::<f64>().map_err(|_| {
                LoaderError::ParseError(format!("line {}: invalid number '{}'", line, field))
            })
        })
        .collect()
}

/// Load a thrust lookup grid.
///
/// The expected CSV format (no header row):
/// - Row 0 (meta): `N, minForce, maxForce, minVoltage, maxVoltage, 0, ...`
/// - Rows 1..=N: the N x N command grid. Rows follow the voltage axis,
///   columns follow the force axis. Rows wider than N are truncated.
///
/// # Errors
///
/// Returns an error if the file is empty, a number cannot be parsed, or the
/// grid does not have N rows of at least N values.
pub fn load_lookup_grid<P: AsRef<Path>>(path: P) -> Result<LookupGrid> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(parse_grid_row(&record, i + 1)?);
    }

    let mut rows = rows.into_iter();
    let meta_row = rows
        .next()
        .ok_or_else(|| LoaderError::EmptyFile(path.to_path_buf()))?;

    if meta_row.len() < 5 {
        return Err(LoaderError::InvalidGrid(format!(
            "meta row needs 5 values, found {}",
            meta_row.len()
        )));
    }

    let size = meta_row[0].round();
    if !size.is_finite() || size < 1.0 {
        return Err(LoaderError::InvalidGrid(format!(
            "invalid grid size {}",
            meta_row[0]
        )));
    }
    let grid_rows = rows.len();
    if size != grid_rows as f64 {
        return Err(LoaderError::InvalidGrid(format!(
            "expected {} grid rows, found {}",
            size, grid_rows
        )));
    }
    let size = grid_rows;

    let meta = LookupMeta {
        size,
        min_force: meta_row[1],
        max_force: meta_row[2],
        min_voltage: meta_row[3],
        max_voltage: meta_row[4],
    };

    let mut cmd = Vec::with_capacity(size);
    for (i, mut row) in rows.enumerate() {
        if row.len() < size {
            return Err(LoaderError::InvalidGrid(format!(
                "grid row {} has {} values, expected {}",
                i, row.len(), size
            )));
        }
        row.truncate(size);
        cmd.push(row);
    }

    Ok(LookupGrid::from_parts(meta, cmd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_table_operations() {
        let mut table = LogTable::from_columns(vec![
            ("thrust", vec![1.0, 2.0]),
            ("rpm", vec![1000.0, 2000.0]),
        ]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);

        assert_eq!(table.pick_column(&["thrust_N", "thrust"]), Some("thrust"));
        assert_eq!(table.pick_column(&["missing"]), None);

        assert!(table.rename_column("thrust", "thrust_N"));
        assert!(!table.rename_column("thrust", "other"));
        assert_eq!(table.column_names(), vec!["thrust_N", "rpm"]);

        table.insert_column("rpm", vec![1.0, 2.0]);
        table.insert_column("power_W", vec![3.0, 4.0]);
        assert_eq!(table.column_names(), vec!["thrust_N", "rpm", "power_W"]);
        assert_eq!(table.column("rpm"), Some(&[1.0, 2.0][..]));

        let selected = table.select(&["power_W", "thrust_N"]).unwrap();
        assert_eq!(selected.column_names(), vec!["power_W", "thrust_N"]);
        assert!(table.select(&["nope"]).is_err());
    }

    #[test]
    fn test_load_log_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time_s, throttle ,thrust_g").unwrap();
        writeln!(file, "0.0,10,100").unwrap();
        writeln!(file, "0.1,,abc").unwrap();
        writeln!(file, "0.2,20").unwrap();
        file.flush().unwrap();

        let table = load_log_csv(file.path())?;
        assert_eq!(table.column_names(), vec!["time_s", "throttle", "thrust_g"]);
        assert_eq!(table.num_rows(), 3);

        let throttle = table.column("throttle").unwrap();
        assert_eq!(throttle[0], 10.0);
        assert!(throttle[1].is_nan());
        assert_eq!(throttle[2], 20.0);

        let thrust = table.column("thrust_g").unwrap();
        assert!(thrust[1].is_nan());
        assert!(thrust[2].is_nan());

        Ok(())
    }

    #[test]
    fn test_load_log_csv_detects_integer_columns() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time_s,rpm,throttle,thrust_N,count").unwrap();
        writeln!(file, "0.0,1000,10,1.5,1").unwrap();
        writeln!(file, "0.1, 2000 ,,2.0,1e3").unwrap();
        file.flush().unwrap();

        let mut table = load_log_csv(file.path())?;
        assert_eq!(table.column_kind("time_s"), Some(ColumnKind::Float));
        assert_eq!(table.column_kind("rpm"), Some(ColumnKind::Integer));
        assert_eq!(table.column_kind("throttle"), Some(ColumnKind::Float));
        assert_eq!(table.column_kind("thrust_N"), Some(ColumnKind::Float));
        assert_eq!(table.column_kind("count"), Some(ColumnKind::Float));

        assert!(table.rename_column("rpm", "motor_rpm"));
        assert_eq!(table.column_kind("motor_rpm"), Some(ColumnKind::Integer));
        let selected = table.select(&["motor_rpm"])?;
        assert_eq!(selected.column_kind("motor_rpm"), Some(ColumnKind::Integer));

        table.insert_column("motor_rpm", vec![1.5, 2.5]);
        assert_eq!(table.column_kind("motor_rpm"), Some(ColumnKind::Float));

        Ok(())
    }

    #[test]
    fn test_load_log_csv_header_only() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "speed_mps,power_W").unwrap();
        file.flush().unwrap();

        let result = load_log_csv(file.path());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_load_lookup_grid() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "3,0,10,10,20").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5,6").unwrap();
        writeln!(file, "7,8,9").unwrap();
        file.flush().unwrap();

        let grid = load_lookup_grid(file.path())?;
        assert_eq!(grid.size(), 3);
        assert_eq!(grid.forces, vec![0.0, 5.0, 10.0]);
        assert_eq!(grid.voltages, vec![10.0, 15.0, 20.0]);
        assert_eq!(grid.cmd[1], vec![4.0, 5.0, 6.0]);

        Ok(())
    }

    #[test]
    fn test_load_lookup_grid_truncates_padding() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "2,0,1,11,12,0,0").unwrap();
        writeln!(file, "1,2,0,0,0,0,0").unwrap();
        writeln!(file, "3,4,0,0,0,0,0").unwrap();
        file.flush().unwrap();

        let grid = load_lookup_grid(file.path())?;
        assert_eq!(grid.cmd, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(grid.meta.max_voltage, 12.0);

        Ok(())
    }

    #[test]
    fn test_load_lookup_grid_wrong_row_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "3,0,10,10,20").unwrap();
        writeln!(file, "1,2,3").unwrap();
        file.flush().unwrap();

        let result = load_lookup_grid(file.path());
        assert!(matches!(result, Err(LoaderError::InvalidGrid(_))));
    }

    #[test]
    fn test_load_lookup_grid_huge_size_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1e15,0,1,1,2").unwrap();
        writeln!(file, "1").unwrap();
        file.flush().unwrap();

        let result = load_lookup_grid(file.path());
        assert!(matches!(result, Err(LoaderError::InvalidGrid(_))));
    }

    #[test]
    fn test_load_lookup_grid_bad_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1,0,1,1,2").unwrap();
        writeln!(file, "x").unwrap();
        file.flush().unwrap();

        let result = load_lookup_grid(file.path());
        assert!(matches!(result, Err(LoaderError::ParseError(_))));
    }
}
