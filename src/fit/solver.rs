//! Solver wrapper: runs Levenberg-Marquardt over a [`ResidualFunction`].

use tracing::{debug, info};

use crate::domain::SolverOptions;
use crate::error::FitError;
use crate::math::{LevenbergMarquardt, LmOutput};

use super::ResidualFunction;

impl From<&SolverOptions> for LevenbergMarquardt {
    fn from(options: &SolverOptions) -> Self {
        Self {
            ftol: options.ftol,
            xtol: options.xtol,
            gtol: options.gtol,
            max_evaluations: options.max_evaluations,
            ..LevenbergMarquardt::default()
        }
    }
}

/// Minimize the residuals starting from `initial`.
///
/// Evaluation errors (rejected projection, untransformable point) abort the
/// run. Non-convergence is reported in the returned report.
pub fn solve(residual: &ResidualFunction<'_>, initial: &[f64], options: &SolverOptions) -> Result<LmOutput, FitError> {
    let solver = LevenbergMarquardt::from(options);
    info!(unknowns = initial.len(), residuals = residual.len(), "solving");
    debug!(?solver, ?initial, "solver setup");

    let out = solver.minimize(initial, |x| residual.evaluate(x))?;

    info!(
        termination = ?out.report.termination,
        evaluations = out.report.evaluations,
        iterations = out.report.iterations,
        sse = out.report.sse,
        "solver finished"
    );
    Ok(out)
}
