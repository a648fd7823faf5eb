//! Command-line interface for the propulsion data pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EfficiencyConfig;
use crate::processors::{efficiency, thrust_lookup, thrust_map};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "propulsion-pipeline")]
#[command(about = "Turn propulsion test logs into report-ready CSV tables", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bin a flight log by speed into efficiency_<name>.csv
    Efficiency {
        /// Path to raw flight log CSV
        #[arg(long)]
        input: PathBuf,
        /// Name suffix for outputs (e.g. xwing_indi)
        #[arg(long)]
        name: String,
        /// Output directory (defaults to the configured output dir)
        #[arg(long)]
        outdir: Option<PathBuf>,
        /// Number of speed bins for averaging
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        bins: Option<u32>,
        /// Also render a PNG preview of the curve
        #[arg(long)]
        plot: bool,
    },

    /// Average thrust per throttle and rpm from a test-stand log
    ThrustMap {
        /// Path to raw log CSV
        #[arg(long)]
        input: PathBuf,
        /// Name suffix for outputs (e.g. motorA)
        #[arg(long)]
        name: String,
        /// Output directory (defaults to the configured output dir)
        #[arg(long)]
        outdir: Option<PathBuf>,
        /// Also render PNG previews of the curves
        #[arg(long)]
        plot: bool,
    },

    /// Convert a thrust lookup grid to long form and a thrust-throttle curve
    ThrustLookup {
        /// Path to the lookup grid CSV (meta row + N x N grid)
        #[arg(long)]
        input: PathBuf,
        /// Name suffix for outputs
        #[arg(long)]
        name: String,
        /// Output directory (defaults to the configured output dir)
        #[arg(long)]
        outdir: Option<PathBuf>,
        /// Voltage slice for the 1D curve (default: middle voltage)
        #[arg(long, allow_negative_numbers = true)]
        voltage: Option<f64>,
        /// Command mapped to 0 % throttle
        #[arg(long, allow_negative_numbers = true)]
        min_cmd: Option<f64>,
        /// Command mapped to 100 % throttle
        #[arg(long, allow_negative_numbers = true)]
        max_cmd: Option<f64>,
        /// Also render a PNG preview of the curve
        #[arg(long)]
        plot: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            let tail: String = value.chars().rev().take(34).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn paths_summary<'a, I: IntoIterator<Item = &'a Path>>(paths: I) -> String {
    paths
        .into_iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Efficiency { input, name, outdir, bins, plot } => {
            let outdir = outdir.unwrap_or_else(|| config.output.dir.clone());
            cmd_efficiency(&input, &outdir, &name, bins, plot, &config);
        }
        Commands::ThrustMap { input, name, outdir, plot } => {
            let outdir = outdir.unwrap_or_else(|| config.output.dir.clone());
            cmd_thrust_map(&input, &outdir, &name, plot, &config);
        }
        Commands::ThrustLookup { input, name, outdir, voltage, min_cmd, max_cmd, plot } => {
            let outdir = outdir.unwrap_or_else(|| config.output.dir.clone());
            let options = thrust_lookup::LookupOptions { voltage, min_cmd, max_cmd };
            cmd_thrust_lookup(&input, &outdir, &name, &options, plot, &config);
        }
    }
}

fn cmd_efficiency(
    input: &Path,
    outdir: &Path,
    name: &str,
    bins: Option<u32>,
    plot: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let eff_config = EfficiencyConfig {
        bins: bins.map_or(config.efficiency.bins, |b| b as usize),
        ..config.efficiency.clone()
    };

    let spinner = create_spinner("Binning flight log by speed...");

    match efficiency::process_efficiency(input, outdir, name, &eff_config, plot.then_some(&config.plot)) {
        Ok(report) => {
            spinner.finish_and_clear();

            let mut written = vec![report.output.as_path()];
            written.extend(report.plot.as_deref());

            print_summary(
                "Efficiency Table Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output directory", outdir.display().to_string()),
                    ("Files written", paths_summary(written)),
                    (
                        "Speed range",
                        format!("{:.2} - {:.2} m/s", report.speed_range.0, report.speed_range.1),
                    ),
                    ("Bins kept", format!("{} of {}", report.rows, report.bins)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Efficiency processing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_thrust_map(input: &Path, outdir: &Path, name: &str, plot: bool, config: &PipelineConfig) {
    let start = Instant::now();

    let spinner = create_spinner("Building thrust maps...");

    match thrust_map::process_thrust_map(input, outdir, name, &config.columns, plot.then_some(&config.plot)) {
        Ok(report) => {
            spinner.finish_and_clear();

            let mut written = report.outputs();
            written.extend(report.plots.iter().map(|p| p.as_path()));

            print_summary(
                "Thrust Map Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output directory", outdir.display().to_string()),
                    ("Files written", paths_summary(written)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Thrust map processing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_thrust_lookup(
    input: &Path,
    outdir: &Path,
    name: &str,
    options: &thrust_lookup::LookupOptions,
    plot: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let spinner = create_spinner("Converting thrust lookup grid...");

    match thrust_lookup::process_thrust_lookup(
        input,
        outdir,
        name,
        options,
        &config.lookup,
        plot.then_some(&config.plot),
    ) {
        Ok(report) => {
            spinner.finish_and_clear();

            let mut written = vec![report.long_form.as_path(), report.curve.as_path()];
            written.extend(report.plot.as_deref());

            print_summary(
                "Lookup Conversion Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output directory", outdir.display().to_string()),
                    ("Files written", paths_summary(written)),
                    ("Grid size", format!("{0}x{0}", report.grid_size)),
                    ("Slice voltage", format!("{:.2} V", report.voltage_v)),
                    ("Curve points", report.curve_points.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Lookup conversion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
