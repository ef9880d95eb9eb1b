//! Levenberg-Marquardt nonlinear least squares.
//!
//! Minimizes `‖r(x)‖²` for a residual function `r: Rⁿ → Rᵐ` that is only
//! available as a black box (here: a projection rebuilt and evaluated per
//! call), so the Jacobian is estimated by forward differences.
//!
//! Each step solves the damped problem
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! where `D` holds the (running maximum) Jacobian column norms. Steps with a
//! poor actual/predicted reduction ratio are rejected and `λ` grows; good
//! steps shrink `λ` (Nielsen's update).
//!
//! Termination follows MINPACK's `lmdif`: several distinct signals count as
//! convergence, see [`Termination::is_success`].

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::debug;

use super::solve_least_squares;

/// Minimum actual/predicted reduction ratio for accepting a step.
const ACCEPT_RATIO: f64 = 1e-4;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Relative reduction of the sum of squares is at most `ftol`.
    Ftol,
    /// Relative change of the parameters is at most `xtol`.
    Xtol,
    /// Both `Ftol` and `Xtol` hold.
    FtolAndXtol,
    /// Residuals are orthogonal to the Jacobian columns within `gtol`.
    Orthogonal,
    /// The residual evaluation budget was exhausted.
    MaxEvaluations,
    /// `ftol` is below machine precision; no further reduction is possible.
    FtolTooSmall,
    /// `xtol` is below machine precision; no further improvement is possible.
    XtolTooSmall,
    /// `gtol` is below machine precision; residuals are as orthogonal as they get.
    GtolTooSmall,
    /// Residuals or damping became non-finite.
    NonFinite,
    /// Fewer residuals than unknowns; the problem is underdetermined.
    ImproperInput,
}

impl Termination {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Termination::Ftol | Termination::Xtol | Termination::FtolAndXtol | Termination::Orthogonal
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Termination::Ftol => "relative reduction in the sum of squares is at most ftol",
            Termination::Xtol => "relative error between two iterates is at most xtol",
            Termination::FtolAndXtol => "both ftol and xtol convergence criteria hold",
            Termination::Orthogonal => "residuals are orthogonal to the Jacobian columns",
            Termination::MaxEvaluations => "maximum number of residual evaluations reached",
            Termination::FtolTooSmall => "ftol is too small, no further reduction in the sum of squares is possible",
            Termination::XtolTooSmall => "xtol is too small, no further improvement in the solution is possible",
            Termination::GtolTooSmall => "gtol is too small, residuals are orthogonal to machine precision",
            Termination::NonFinite => "residuals became non-finite",
            Termination::ImproperInput => "fewer residuals than unknowns",
        }
    }
}

/// Summary of a solver run.
#[derive(Debug, Clone, Serialize)]
pub struct SolverReport {
    pub termination: Termination,
    pub evaluations: usize,
    pub iterations: usize,
    /// Sum of squared residuals at the returned parameters.
    pub sse: f64,
}

/// Parameters and residuals at termination.
#[derive(Debug, Clone)]
pub struct LmOutput {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    pub report: SolverReport,
}

#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Residual evaluation cap; `None` means `200 * (n + 1)`.
    pub max_evaluations: Option<usize>,
    /// Initial damping, relative to the squared column norms.
    pub initial_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_evaluations: None,
            initial_lambda: 1e-3,
        }
    }
}

impl LevenbergMarquardt {
    /// Minimize `‖residual_fn(x)‖²` starting from `x0`.
    ///
    /// Errors from `residual_fn` abort the run and are returned as-is.
    /// Non-convergence is reported through [`SolverReport::termination`].
    pub fn minimize<F, E>(&self, x0: &[f64], mut residual_fn: F) -> Result<LmOutput, E>
    where
        F: FnMut(&[f64]) -> Result<Vec<f64>, E>,
    {
        let n = x0.len();
        let max_evaluations = self.max_evaluations.unwrap_or(200 * (n + 1));

        let mut x = DVector::from_column_slice(x0);
        let mut r = DVector::from_vec(residual_fn(x.as_slice())?);
        let mut evaluations = 1usize;
        let mut iterations = 0usize;
        let mut fnorm = r.norm();

        let finish = |termination, x: DVector<f64>, r: DVector<f64>, evaluations, iterations| LmOutput {
            report: SolverReport {
                termination,
                evaluations,
                iterations,
                sse: r.norm_squared(),
            },
            x: x.as_slice().to_vec(),
            residuals: r.as_slice().to_vec(),
        };

        if !fnorm.is_finite() {
            return Ok(finish(Termination::NonFinite, x, r, evaluations, iterations));
        }
        if n == 0 {
            return Ok(finish(Termination::Orthogonal, x, r, evaluations, iterations));
        }
        if r.len() < n {
            return Ok(finish(Termination::ImproperInput, x, r, evaluations, iterations));
        }

        let mut lambda = self.initial_lambda.max(f64::MIN_POSITIVE);
        let mut nu = 2.0;
        let mut diag = DVector::<f64>::zeros(n);

        loop {
            iterations += 1;
            let jac = forward_difference(&mut residual_fn, &x, &r)?;
            evaluations += n;

            for j in 0..n {
                let norm = jac.column(j).norm();
                diag[j] = if iterations == 1 {
                    if norm == 0.0 { 1.0 } else { norm }
                } else {
                    diag[j].max(norm)
                };
            }

            let gnorm = scaled_gradient_norm(&jac, &r, fnorm);
            if gnorm <= self.gtol {
                return Ok(finish(Termination::Orthogonal, x, r, evaluations, iterations));
            }

            loop {
                let Some(step) = damped_step(&jac, &r, &diag, lambda) else {
                    lambda *= nu;
                    nu *= 2.0;
                    if !lambda.is_finite() {
                        return Ok(finish(Termination::NonFinite, x, r, evaluations, iterations));
                    }
                    continue;
                };

                let x_trial = &x + &step;
                let r_trial = DVector::from_vec(residual_fn(x_trial.as_slice())?);
                evaluations += 1;
                let fnorm_trial = r_trial.norm();

                let pnorm = diag.component_mul(&step).norm();
                let actred = if fnorm_trial.is_finite() && 0.1 * fnorm_trial < fnorm {
                    1.0 - (fnorm_trial / fnorm).powi(2)
                } else {
                    -1.0
                };
                let temp1 = (&jac * &step).norm() / fnorm;
                let temp2 = lambda.sqrt() * pnorm / fnorm;
                let prered = temp1 * temp1 + 2.0 * temp2 * temp2;
                let ratio = if prered != 0.0 { actred / prered } else { 0.0 };

                let accepted = ratio > ACCEPT_RATIO;
                if accepted {
                    x = x_trial;
                    r = r_trial;
                    fnorm = fnorm_trial;
                    lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * ratio - 1.0).powi(3));
                    nu = 2.0;
                } else {
                    lambda *= nu;
                    nu *= 2.0;
                }
                let xnorm = diag.component_mul(&x).norm();

                debug!(
                    iteration = iterations,
                    evaluations,
                    fnorm,
                    lambda,
                    ratio,
                    accepted,
                    "levenberg-marquardt step"
                );

                let ftol_hit = actred.abs() <= self.ftol && prered <= self.ftol && 0.5 * ratio <= 1.0;
                let xtol_hit = pnorm <= self.xtol * xnorm;
                let termination = match (ftol_hit, xtol_hit) {
                    (true, true) => Some(Termination::FtolAndXtol),
                    (true, false) => Some(Termination::Ftol),
                    (false, true) => Some(Termination::Xtol),
                    (false, false) => {
                        if evaluations >= max_evaluations {
                            Some(Termination::MaxEvaluations)
                        } else if actred.abs() <= f64::EPSILON && prered <= f64::EPSILON && 0.5 * ratio <= 1.0 {
                            Some(Termination::FtolTooSmall)
                        } else if pnorm <= f64::EPSILON * xnorm {
                            Some(Termination::XtolTooSmall)
                        } else if gnorm <= f64::EPSILON {
                            Some(Termination::GtolTooSmall)
                        } else if !lambda.is_finite() {
                            Some(Termination::NonFinite)
                        } else {
                            None
                        }
                    }
                };
                if let Some(termination) = termination {
                    return Ok(finish(termination, x, r, evaluations, iterations));
                }

                if accepted {
                    break;
                }
            }
        }
    }
}

/// Forward-difference Jacobian of `residual_fn` at `x`, where `r = residual_fn(x)`.
fn forward_difference<F, E>(residual_fn: &mut F, x: &DVector<f64>, r: &DVector<f64>) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, E>,
{
    let eps = f64::EPSILON.sqrt();
    let (m, n) = (r.len(), x.len());
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut xh = x.clone();

    for j in 0..n {
        let mut h = eps * x[j].abs();
        if h == 0.0 {
            h = eps;
        }
        xh[j] = x[j] + h;
        // Use the step actually representable in floating point.
        let h = xh[j] - x[j];
        let rh = residual_fn(xh.as_slice())?;
        xh[j] = x[j];

        debug_assert_eq!(rh.len(), m);
        for i in 0..m {
            jac[(i, j)] = (rh[i] - r[i]) / h;
        }
    }

    Ok(jac)
}

/// Largest cosine between the residual vector and a Jacobian column.
fn scaled_gradient_norm(jac: &DMatrix<f64>, r: &DVector<f64>, fnorm: f64) -> f64 {
    if fnorm == 0.0 {
        return 0.0;
    }
    jac.column_iter()
        .filter_map(|col| {
            let norm = col.norm();
            (norm != 0.0).then(|| (col.dot(r) / (norm * fnorm)).abs())
        })
        .fold(0.0, f64::max)
}

/// Solve `[J; √λ D] δ = [-r; 0]` in the least squares sense.
fn damped_step(jac: &DMatrix<f64>, r: &DVector<f64>, diag: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jac);
    let sqrt_lambda = lambda.sqrt();
    for j in 0..n {
        a[(m + j, j)] = sqrt_lambda * diag[j];
    }

    let mut b = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        b[i] = -r[i];
    }

    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> Result<Vec<f64>, ()> {
        Ok(vec![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]])
    }

    #[test]
    fn fits_a_line_exactly() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = t.iter().map(|t| 2.0 * t + 1.0).collect();

        let out = LevenbergMarquardt::default()
            .minimize(&[0.0, 0.0], |p: &[f64]| -> Result<Vec<f64>, ()> {
                Ok(t.iter().zip(&y).map(|(t, y)| y - (p[0] * t + p[1])).collect())
            })
            .unwrap();

        assert!(out.report.termination.is_success(), "{:?}", out.report);
        assert!((out.x[0] - 2.0).abs() < 1e-8);
        assert!((out.x[1] - 1.0).abs() < 1e-8);
        assert!(out.report.sse < 1e-12);
    }

    #[test]
    fn solves_rosenbrock_from_the_classic_start() {
        let out = LevenbergMarquardt::default().minimize(&[-1.2, 1.0], rosenbrock).unwrap();

        assert!(out.report.termination.is_success(), "{:?}", out.report);
        assert!((out.x[0] - 1.0).abs() < 1e-6);
        assert!((out.x[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn evaluation_budget_is_a_failure() {
        let solver = LevenbergMarquardt {
            max_evaluations: Some(3),
            ..LevenbergMarquardt::default()
        };
        let out = solver.minimize(&[-1.2, 1.0], rosenbrock).unwrap();

        assert_eq!(out.report.termination, Termination::MaxEvaluations);
        assert!(!out.report.termination.is_success());
    }

    #[test]
    fn residual_errors_propagate() {
        let mut calls = 0;
        let result = LevenbergMarquardt::default().minimize(&[1.0], |x: &[f64]| {
            calls += 1;
            if calls > 1 { Err("boom") } else { Ok(vec![x[0] - 3.0]) }
        });
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn underdetermined_problem_is_rejected() {
        let out = LevenbergMarquardt::default()
            .minimize(&[0.0, 0.0, 0.0], |x: &[f64]| -> Result<Vec<f64>, ()> { Ok(vec![x[0] + x[1] + x[2] - 1.0]) })
            .unwrap();
        assert_eq!(out.report.termination, Termination::ImproperInput);
        assert_eq!(out.report.evaluations, 1);
    }

    #[test]
    fn empty_parameter_vector_returns_initial_residuals() {
        let out = LevenbergMarquardt::default()
            .minimize(&[], |_: &[f64]| -> Result<Vec<f64>, ()> { Ok(vec![0.5, -0.5]) })
            .unwrap();
        assert!(out.x.is_empty());
        assert_eq!(out.residuals, vec![0.5, -0.5]);
        assert_eq!(out.report.evaluations, 1);
    }

    #[test]
    fn only_convergence_signals_count_as_success() {
        for t in [
            Termination::Ftol,
            Termination::Xtol,
            Termination::FtolAndXtol,
            Termination::Orthogonal,
        ] {
            assert!(t.is_success());
        }
        for t in [
            Termination::MaxEvaluations,
            Termination::FtolTooSmall,
            Termination::XtolTooSmall,
            Termination::GtolTooSmall,
            Termination::NonFinite,
            Termination::ImproperInput,
        ] {
            assert!(!t.is_success());
        }
    }
}
