//! Damped Gauss-Newton (Levenberg-Marquardt) nonlinear least squares.
//!
//! We minimize `S(θ) = Σ r_i(θ)^2` where `r_i = y_i - f(t_i; θ)`.
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·D) δ = Jᵀr
//! ```
//!
//! with `J` the model Jacobian (∂f/∂θ) and `D` the floored diagonal of `JᵀJ`.
//! Accepted steps shrink `λ` toward plain Gauss-Newton; rejected steps grow it
//! toward scaled gradient descent.

use nalgebra::{DMatrix, DVector};

/// Problem interface: residuals and model Jacobian at a parameter vector.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;

    /// `y - f(θ)` for every observation.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// `∂f/∂θ`, one row per observation.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Relative step size below which the fit is considered converged.
    pub x_tol: f64,
    /// Relative RSS reduction below which the fit is considered converged.
    pub f_tol: f64,
    /// Absolute gradient norm below which the fit is considered converged.
    pub g_tol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            x_tol: 1e-10,
            f_tol: 1e-12,
            g_tol: 1e-12,
        }
    }
}

/// Why a solve did not produce an estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// Iteration cap reached without meeting any convergence test.
    MaxIterations(usize),
    /// Residuals or Jacobian contained NaN/inf.
    NonFinite,
    /// Damping grew past its ceiling without finding a downhill step.
    Stalled,
    /// Parameter vector length does not match the problem.
    BadInitialGuess,
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::MaxIterations(n) => write!(f, "no convergence after {n} iterations"),
            SolveError::NonFinite => write!(f, "non-finite residuals or jacobian"),
            SolveError::Stalled => write!(f, "step damping exhausted"),
            SolveError::BadInitialGuess => write!(f, "initial guess has wrong length"),
        }
    }
}

impl std::error::Error for SolveError {}

/// Converged estimate.
#[derive(Debug, Clone)]
pub struct Solution {
    pub params: DVector<f64>,
    /// Residual sum of squares at `params`.
    pub rss: f64,
    /// Jacobian at `params` (for the covariance).
    pub jacobian: DMatrix<f64>,
    pub iterations: usize,
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: DVector<f64>,
    opts: &SolverOptions,
) -> Result<Solution, SolveError> {
    let p = problem.n_params();
    if initial.len() != p {
        return Err(SolveError::BadInitialGuess);
    }

    let mut params = initial;
    let mut resid = problem.residuals(&params);
    let mut rss = resid.norm_squared();
    if !rss.is_finite() {
        return Err(SolveError::NonFinite);
    }

    let mut lambda = LAMBDA_INIT;

    for iter in 1..=opts.max_iterations {
        let jac = problem.jacobian(&params);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite);
        }

        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &resid;

        // Exact fits (and flat minima) end here.
        if rss == 0.0 || grad.amax() <= opts.g_tol {
            return Ok(Solution {
                params,
                rss,
                jacobian: jac,
                iterations: iter - 1,
            });
        }

        let (trial, trial_resid, trial_rss) = loop {
            if lambda > LAMBDA_MAX {
                return Err(SolveError::Stalled);
            }

            let mut damped = jtj.clone();
            for i in 0..p {
                damped[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
            }

            let Some(step) = damped.cholesky().map(|c| c.solve(&grad)) else {
                lambda *= 10.0;
                continue;
            };

            // At the rounding floor no step lowers RSS; a negligible step
            // means we are already there.
            if step.norm() <= opts.x_tol * (params.norm() + opts.x_tol) {
                return Ok(Solution {
                    params,
                    rss,
                    jacobian: jac,
                    iterations: iter - 1,
                });
            }

            let trial = &params + &step;
            let trial_resid = problem.residuals(&trial);
            let trial_rss = trial_resid.norm_squared();

            if trial_rss.is_finite() && trial_rss <= rss {
                break (trial, trial_resid, trial_rss);
            }
            lambda *= 10.0;
        };

        lambda = (lambda / 10.0).max(LAMBDA_MIN);

        let rss_flat = (rss - trial_rss) <= opts.f_tol * rss;

        params = trial;
        resid = trial_resid;
        rss = trial_rss;

        if rss_flat {
            let jacobian = problem.jacobian(&params);
            if jacobian.iter().any(|v| !v.is_finite()) {
                return Err(SolveError::NonFinite);
            }
            return Ok(Solution {
                params,
                rss,
                jacobian,
                iterations: iter,
            });
        }
    }

    Err(SolveError::MaxIterations(opts.max_iterations))
}

/// Asymptotic covariance `σ²·(JᵀJ)⁻¹` with `σ² = RSS / df`.
///
/// Returns `None` when there are no residual degrees of freedom (`n <= p`)
/// or when `JᵀJ` is singular.
pub fn covariance(jacobian: &DMatrix<f64>, rss: f64) -> Option<DMatrix<f64>> {
    let n = jacobian.nrows();
    let p = jacobian.ncols();
    if n <= p {
        return None;
    }
    let sigma2 = rss / (n - p) as f64;

    let jtj = jacobian.transpose() * jacobian;
    let inv = jtj.try_inverse()?;
    let cov = inv * sigma2;
    if cov.iter().all(|v| v.is_finite()) {
        Some(cov)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a * exp(b * x)
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn n_params(&self) -> usize {
            2
        }

        fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x
                    .iter()
                    .zip(&self.y)
                    .map(|(&x, &y)| y - params[0] * (params[1] * x).exp()),
            )
        }

        fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.x.len(), 2);
            for (i, &x) in self.x.iter().enumerate() {
                let e = (params[1] * x).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = params[0] * x * e;
            }
            j
        }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
        let y = x.iter().map(|&x| 3.0 * (-0.7 * x).exp()).collect();
        let problem = ExpDecay { x, y };

        let sol = levenberg_marquardt(
            &problem,
            DVector::from_row_slice(&[1.0, -0.1]),
            &SolverOptions::default(),
        )
        .unwrap();

        assert!((sol.params[0] - 3.0).abs() < 1e-6, "a={}", sol.params[0]);
        assert!((sol.params[1] + 0.7).abs() < 1e-6, "b={}", sol.params[1]);
        assert!(sol.rss < 1e-12);
    }

    #[test]
    fn iteration_cap_is_enforced() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
        let y = x.iter().map(|&x| 3.0 * (-0.7 * x).exp() + 0.01 * x.sin()).collect();
        let problem = ExpDecay { x, y };

        let opts = SolverOptions {
            max_iterations: 1,
            ..SolverOptions::default()
        };
        let err = levenberg_marquardt(&problem, DVector::from_row_slice(&[10.0, 1.0]), &opts)
            .unwrap_err();
        assert_eq!(err, SolveError::MaxIterations(1));
    }

    #[test]
    fn wrong_guess_length_is_rejected() {
        let problem = ExpDecay {
            x: vec![0.0, 1.0],
            y: vec![1.0, 2.0],
        };
        let err = levenberg_marquardt(&problem, DVector::zeros(3), &SolverOptions::default())
            .unwrap_err();
        assert_eq!(err, SolveError::BadInitialGuess);
    }

    #[test]
    fn covariance_scales_with_residual_variance() {
        // Straight line through 4 points: JᵀJ = [[4, 6], [6, 14]].
        let j = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let cov = covariance(&j, 2.0).unwrap();
        // σ² = 2 / (4 - 2) = 1, det = 20, so var(β0) = 14/20.
        assert!((cov[(0, 0)] - 0.7).abs() < 1e-12);
        assert!((cov[(1, 1)] - 0.2).abs() < 1e-12);

        let singular = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(covariance(&singular, 1.0).is_none());
    }

    #[test]
    fn exactly_determined_fit_has_no_covariance() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        assert!(covariance(&j, 0.0).is_none());
    }
}
