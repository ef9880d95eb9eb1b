//! Result formatter: solved vector back to a named solution.

use std::collections::BTreeMap;

use crate::definition::canonicalize;
use crate::domain::{FitSolution, Point};
use crate::error::FitError;
use crate::math::SolverReport;

use super::{TemplateBuild, UnknownId, regroup};

/// Build the solution for solved vector `x` and its flat residuals.
pub fn format_solution(
    build: &TemplateBuild,
    points: &[Point],
    x: &[f64],
    flat_residuals: &[f64],
    report: Option<SolverReport>,
) -> Result<FitSolution, FitError> {
    let projstring = canonicalize(&build.template.render(build.projection_values(x)))?;

    let parameters: BTreeMap<String, f64> = build
        .unknowns
        .iter()
        .zip(x)
        .filter_map(|(id, value)| match id {
            UnknownId::Param(slot) => Some((slot.identifier(), *value)),
            UnknownId::Modifier(_) => None,
        })
        .collect();

    Ok(FitSolution {
        projstring,
        parameters,
        modifiers: build.modifiers.resolve(x),
        residuals: regroup(flat_residuals, points)?,
        report,
    })
}
