//! Simple linear regression `y = β0 + β1·x`.
//!
//! Used for the behavior sheets (e.g. activity against wavelength in nm).
//! Coefficient inference uses the usual OLS covariance `σ²·(XᵀX)⁻¹` with
//! `n − 2` residual degrees of freedom and two-sided Student t p-values.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::AppError;
use crate::math::{fit_least_squares, gram_inverse};

/// One estimated coefficient with its inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone)]
pub struct LinearRegression {
    pub intercept: Coefficient,
    pub slope: Coefficient,
    pub r_squared: f64,
    /// Residual standard error.
    pub sigma: f64,
    pub df_residual: usize,
    pub n: usize,
}

pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearRegression, AppError> {
    if x.len() != y.len() {
        return Err(AppError::input(format!(
            "Regression inputs differ in length: x={}, y={}.",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Err(AppError::insufficient(format!(
            "Regression needs at least 3 complete rows, got {n}."
        )));
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    let response = DVector::from_row_slice(y);

    let fit = fit_least_squares(&design, &response)
        .ok_or_else(|| AppError::numeric("Regression design could not be solved."))?;
    let unscaled = gram_inverse(&design)
        .ok_or_else(|| AppError::numeric("Predictor is constant; slope is not identifiable."))?;

    let df_residual = n - 2;
    let sigma2 = fit.rss / df_residual as f64;

    let mean_y = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - fit.rss / tss } else { f64::NAN };

    let t_dist = StudentsT::new(0.0, 1.0, df_residual as f64)
        .map_err(|e| AppError::numeric(format!("t distribution error: {e}")))?;
    let coefficient = |j: usize| {
        let estimate = fit.beta[j];
        let std_error = (sigma2 * unscaled[(j, j)]).sqrt();
        let t_value = estimate / std_error;
        let p_value = if t_value.is_finite() {
            2.0 * t_dist.sf(t_value.abs())
        } else if std_error == 0.0 && estimate != 0.0 {
            0.0
        } else {
            f64::NAN
        };
        Coefficient {
            estimate,
            std_error,
            t_value,
            p_value,
        }
    };

    Ok(LinearRegression {
        intercept: coefficient(0),
        slope: coefficient(1),
        r_squared,
        sigma: sigma2.sqrt(),
        df_residual,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_known_line_with_inference() {
        // y = 1 + 0.5x with residuals (+0.1, -0.1, -0.1, +0.1).
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.1, 1.4, 1.9, 2.6];
        let fit = linear_regression(&x, &y).unwrap();

        assert!((fit.intercept.estimate - 1.0).abs() < 1e-10);
        assert!((fit.slope.estimate - 0.5).abs() < 1e-10);
        assert_eq!(fit.df_residual, 2);
        assert!(fit.r_squared > 0.9 && fit.r_squared < 1.0);
        assert!(fit.slope.p_value > 0.0 && fit.slope.p_value < 0.05);
        assert!((fit.slope.t_value - fit.slope.estimate / fit.slope.std_error).abs() < 1e-12);
    }

    #[test]
    fn constant_predictor_is_rejected() {
        let err = linear_regression(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn too_few_rows_is_insufficient() {
        let err = linear_regression(&[1.0, 2.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
