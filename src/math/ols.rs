//! Linear least squares solver.
//!
//! Each damped solver step is a small linear least squares problem of the form:
//!
//! ```text
//! minimize ‖A δ - b‖²
//! ```
//!
//! where `A` stacks the residual Jacobian on top of the scaled damping rows.
//!
//! Implementation choices:
//! - We use SVD so tall systems (more rows than columns) solve robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimension is tiny (a handful of unknowns), so SVD cost does
//!   not matter next to the coordinate transforms.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_handles_damping_rows() {
        // Identity Jacobian plus a damping row pulls the solution towards zero.
        let a = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let b = DVector::from_row_slice(&[3.0, 3.0, 0.0]);

        let delta = solve_least_squares(&a, &b).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-10);
    }
}
