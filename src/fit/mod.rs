//! Projection parameter fitting.
//!
//! Responsibilities:
//!
//! - build the parameter template and unknown vector (`template`)
//! - evaluate residuals through the transform service (`residual`)
//! - drive the nonlinear solver (`solver`)
//! - map the solved vector back to names (`result`)
//!
//! ```text
//! TargetSpec ──build_template──► TemplateBuild
//!                                    │
//!               unknowns? ── no ──► evaluate once ──► Solved
//!                  │
//!                 yes ──► solve ──► converged? ──► Solved | NotConverged
//! ```

pub mod residual;
pub mod result;
pub mod solver;
pub mod template;

pub use residual::*;
pub use result::*;
pub use solver::*;
pub use template::*;

use tracing::{info, warn};

use crate::domain::{FitSolution, Point, SolverOptions, TargetSpec};
use crate::error::FitError;
use crate::math::SolverReport;

/// Terminal value of a fit.
///
/// Malformed input is a `FitError`; a solver run that did not converge is
/// `NotConverged`.
#[derive(Debug, Clone)]
pub enum FitOutcome {
    Solved(FitSolution),
    NotConverged(SolverReport),
}

impl FitOutcome {
    pub fn solution(&self) -> Option<&FitSolution> {
        match self {
            FitOutcome::Solved(solution) => Some(solution),
            FitOutcome::NotConverged(_) => None,
        }
    }
}

/// Fit the unknown parameters of `target` to the correspondence `points`.
pub fn find_params(
    source: &str,
    target: &TargetSpec,
    points: &[Point],
    options: &SolverOptions,
) -> Result<FitOutcome, FitError> {
    let build = build_template(target);
    let residual = ResidualFunction::new(source, &build, points)?;

    if build.is_fully_known() {
        info!(points = points.len(), "no unknowns, evaluating residuals directly");
        let flat = residual.evaluate(&build.initial)?;
        let solution = format_solution(&build, points, &build.initial, &flat, None)?;
        return Ok(FitOutcome::Solved(solution));
    }

    let out = solve(&residual, &build.initial, options)?;
    if !out.report.termination.is_success() {
        warn!(
            termination = ?out.report.termination,
            reason = out.report.termination.description(),
            "solution not found"
        );
        return Ok(FitOutcome::NotConverged(out.report));
    }

    let solution = format_solution(&build, points, &out.x, &out.residuals, Some(out.report))?;
    Ok(FitOutcome::Solved(solution))
}
