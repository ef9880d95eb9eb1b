//! The fit pipeline behind the binary.
//!
//! point file -> fit -> outcome
//!
//! Printing and exports stay in `app` so this can be driven from tests.

use tracing::info;

use crate::domain::{FitConfig, Point};
use crate::error::AppError;
use crate::fit::{FitOutcome, find_params};
use crate::io::read_points;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub points: Vec<Point>,
    pub outcome: FitOutcome,
}

/// Read the points and fit the target parameters.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let points = read_points(&config.points_path, config.encoding.as_deref())?;
    info!(
        points = points.len(),
        path = %config.points_path.display(),
        unknowns = config.target.unknown_count(),
        "loaded correspondence points"
    );

    let outcome = find_params(&config.source, &config.target, &points, &config.solver)?;
    Ok(RunOutput { points, outcome })
}
