//! Data processing pipelines, one per report table family.

pub mod efficiency;
pub mod thrust_lookup;
pub mod thrust_map;

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::PlotConfig;
use crate::visualization;

// Re-export key types for convenience
pub use efficiency::{compute_efficiency, process_efficiency, EfficiencyError, EfficiencyReport};
pub use thrust_lookup::{
    process_thrust_lookup, throttle_curve_from_grid, LookupError, LookupOptions, LookupReport,
    ThrottleCurve,
};
pub use thrust_map::{
    clean_columns, normalize_log, process_thrust_map, thrust_curve, NormalizedLog, ThrustMapError,
    ThrustMapReport,
};

/// Render a PNG preview next to `csv_path`.
///
/// Plot failures never fail the pipeline; they are logged and `None` is
/// returned.
pub(crate) fn plot_preview(
    csv_path: &Path,
    x: &[f64],
    y: &[f64],
    x_label: &str,
    y_label: &str,
    config: &PlotConfig,
) -> Option<PathBuf> {
    let png_path = csv_path.with_extension("png");
    match visualization::plot_curve(&png_path, x, y, x_label, y_label, config) {
        Ok(()) => {
            info!("Wrote {}", png_path.display());
            Some(png_path)
        }
        Err(e) => {
            warn!("Skipping plot {}: {}", png_path.display(), e);
            None
        }
    }
}
