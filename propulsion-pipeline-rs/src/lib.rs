//! Propulsion test log processing pipeline.
//!
//! This crate turns raw propulsion-test CSV logs into tidy tables for report
//! plots:
//! - Speed-binned efficiency tables (power, summed thrust, Wh/km)
//! - Thrust maps against throttle and rpm, with unit normalisation to newtons
//! - Long-form thrust lookup grids and thrust-vs-throttle curves
//!
//! # Example
//!
//! ```no_run
//! use propulsion_pipeline::{processors::thrust_map::process_thrust_map, ColumnAliases};
//! use std::path::Path;
//!
//! let report = process_thrust_map(
//!     Path::new("logs/motorA.csv"),
//!     Path::new("data"),
//!     "motorA",
//!     &ColumnAliases::default(),
//!     None,
//! )
//! .unwrap();
//! println!("{:?}", report.outputs());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    ColumnAliases, EfficiencyConfig, LookupConfig, OutputConfig, PipelineConfig, PlotConfig,
};
pub use core::loaders::{LogTable, LookupGrid};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
