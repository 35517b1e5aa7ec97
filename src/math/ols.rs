//! Ordinary least squares solver.
//!
//! The report solves a few small linear problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! (simple regression and the nested models behind the ANOVA table).
//!
//! Implementation choices:
//! - SVD handles tall and rank-deficient design matrices (an ANOVA design
//!   with an empty cell is rank-deficient by construction).
//! - The numerical rank is reported so callers can compute residual degrees
//!   of freedom the same way for full-rank and deficient designs.

use nalgebra::{DMatrix, DVector};

/// Singular values below `RANK_TOL * max_singular_value` count as zero.
const RANK_TOL: f64 = 1e-10;

/// Result of a least squares solve.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Numerical rank of the design matrix.
    pub rank: usize,
}

/// Solve a least squares problem using SVD and report RSS and rank.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn fit_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    if x.nrows() != y.len() || x.nrows() == 0 || x.ncols() == 0 {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let tol = (RANK_TOL * max_sv).max(f64::MIN_POSITIVE);
    let rank = svd.singular_values.iter().filter(|&&s| s > tol).count();

    // Try progressively looser tolerances if strict solve fails.
    for &eps in &[tol, 1e-8 * max_sv, 1e-6 * max_sv] {
        if let Ok(beta) = svd.solve(y, eps) {
            if beta.iter().all(|v| v.is_finite()) {
                let resid = y - x * &beta;
                let rss = resid.norm_squared();
                return Some(OlsFit { beta, rss, rank });
            }
        }
    }

    None
}

/// `(XᵀX)⁻¹`, or `None` when the Gram matrix is singular.
pub fn gram_inverse(x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let gram = x.transpose() * x;
    let inv = gram.try_inverse()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
