//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{
    load_log_csv, load_lookup_grid, ColumnKind, LoaderError, LogTable, LookupGrid,
};
pub use transforms::TransformError;
pub use writers::{write_columns_csv, write_log_table, write_table_csv, WriteError};
