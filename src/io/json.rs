//! Write a fitted solution as JSON.
//!
//! The JSON carries everything needed to reuse or audit a fit:
//! - canonical projection string and solved values
//! - resolved modifiers
//! - per-point residuals
//! - the solver report (absent when nothing was solved)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{FitSolution, Modifiers, Point};
use crate::error::FitError;
use crate::math::SolverReport;

#[derive(Debug, Serialize)]
struct SolutionFile<'a> {
    tool: &'static str,
    projstring: &'a str,
    parameters: &'a BTreeMap<String, f64>,
    modifiers: &'a Modifiers,
    residuals: Vec<PointResidual<'a>>,
    solver: Option<&'a SolverReport>,
}

#[derive(Debug, Serialize)]
struct PointResidual<'a> {
    label: &'a str,
    residual: &'a [f64],
}

pub fn write_fit_json<W: Write>(writer: W, solution: &FitSolution, points: &[Point]) -> Result<(), FitError> {
    let file = SolutionFile {
        tool: "projfit",
        projstring: &solution.projstring,
        parameters: &solution.parameters,
        modifiers: &solution.modifiers,
        residuals: points
            .iter()
            .zip(&solution.residuals)
            .map(|(point, residual)| PointResidual {
                label: &point.label,
                residual: residual.as_slice(),
            })
            .collect(),
        solver: solution.report.as_ref(),
    };

    serde_json::to_writer_pretty(writer, &file).map_err(|e| FitError::Io {
        context: "Failed to write solution JSON".to_string(),
        source: e.into(),
    })
}

/// Write the solution JSON to a file.
pub fn export_fit_json(path: &Path, solution: &FitSolution, points: &[Point]) -> Result<(), FitError> {
    let file = File::create(path).map_err(|source| FitError::Io {
        context: format!("Failed to create export JSON '{}'", path.display()),
        source,
    })?;
    write_fit_json(file, solution, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coord;
    use crate::math::Termination;

    #[test]
    fn serializes_solution_fields() {
        let points = vec![Point::new(&[39.0, 47.0], &[300000.0, 207338.73], "pt1").unwrap()];
        let solution = FitSolution {
            projstring: "+proj=tmerc +x_0=300000".to_string(),
            parameters: BTreeMap::from([("x_0".to_string(), 300000.0)]),
            modifiers: Modifiers::default(),
            residuals: vec![Coord::xy(0.001, -0.002)],
            report: Some(SolverReport {
                termination: Termination::Xtol,
                evaluations: 12,
                iterations: 3,
                sse: 5e-6,
            }),
        };

        let mut out = Vec::new();
        write_fit_json(&mut out, &solution, &points).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["projstring"], "+proj=tmerc +x_0=300000");
        assert_eq!(value["parameters"]["x_0"], 300000.0);
        assert_eq!(value["modifiers"]["k_0"], 1.0);
        assert_eq!(value["residuals"][0]["label"], "pt1");
        assert_eq!(value["residuals"][0]["residual"][1], -0.002);
        assert_eq!(value["solver"]["termination"], "xtol");
        assert_eq!(value["solver"]["evaluations"], 12);
    }
}
