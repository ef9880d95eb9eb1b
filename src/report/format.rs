//! Formatted terminal output.
//!
//! Residual lines are tab separated so they paste cleanly into spreadsheets;
//! 2-D residuals leave the height column empty.

use crate::domain::{Coord, FitSolution, Modifiers, Point};
use crate::math::SolverReport;

/// `Modifiers: k_0=… x_0=… y_0=… z_0=…`
pub fn format_modifiers(modifiers: &Modifiers) -> String {
    format!(
        "Modifiers: k_0={} x_0={} y_0={} z_0={}",
        modifiers.k_0, modifiers.x_0, modifiers.y_0, modifiers.z_0
    )
}

/// `Residuals:` header followed by one line per point.
pub fn format_residuals(points: &[Point], residuals: &[Coord]) -> String {
    let mut out = String::from("Residuals:\n");
    for (point, r) in points.iter().zip(residuals) {
        match r.z() {
            Some(z) => out.push_str(&format!("{}\t{}\t{}\t{}\n", r.x(), r.y(), z, point.label)),
            None => out.push_str(&format!("{}\t{}\t\t{}\n", r.x(), r.y(), point.label)),
        }
    }
    out
}

/// Default output: projection string, modifiers (when given) and residuals.
pub fn format_fit_output(solution: &FitSolution, points: &[Point], show_modifiers: bool) -> String {
    let mut out = String::new();
    out.push_str(&solution.projstring);
    out.push('\n');
    if show_modifiers {
        out.push_str(&format_modifiers(&solution.modifiers));
        out.push('\n');
    }
    out.push_str(&format_residuals(points, &solution.residuals));
    out
}

pub fn format_no_solution(report: &SolverReport) -> String {
    format!(
        "Solution not found: {} ({} evaluations)",
        report.termination.description(),
        report.evaluations
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Termination;

    #[test]
    fn residual_lines_keep_an_empty_height_column() {
        let points = vec![
            Point::new(&[1.0, 2.0], &[3.0, 4.0], "flat one").unwrap(),
            Point::new(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], "tall").unwrap(),
        ];
        let residuals = vec![Coord::xy(0.5, -0.25), Coord::xyz(0.0, 1.0, 2.5)];

        assert_eq!(
            format_residuals(&points, &residuals),
            "Residuals:\n0.5\t-0.25\t\tflat one\n0\t1\t2.5\ttall\n"
        );
    }

    #[test]
    fn modifiers_line_lists_all_four() {
        let m = Modifiers {
            k_0: 0.9996,
            ..Modifiers::default()
        };
        assert_eq!(format_modifiers(&m), "Modifiers: k_0=0.9996 x_0=0 y_0=0 z_0=0");
    }

    #[test]
    fn no_solution_names_the_reason() {
        let report = SolverReport {
            termination: Termination::MaxEvaluations,
            evaluations: 600,
            iterations: 150,
            sse: 1.0,
        };
        let msg = format_no_solution(&report);
        assert!(msg.starts_with("Solution not found"));
        assert!(msg.contains("maximum number of residual evaluations"));
    }
}
