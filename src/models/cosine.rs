//! Model evaluation for the 24 h cosinor.
//!
//! ```text
//! f(t) = A·cos(2π(t − φ)/24) + O
//! ```
//!
//! Parameter order everywhere is `[A, φ, O]` (amplitude, phase in hours,
//! offset/MESOR).
//!
//! The fitter relies on two primitive operations:
//! - fill a Jacobian row for a given timepoint (for the solver)
//! - predict f(t) given parameters (for residuals/plots)

use std::f64::consts::PI;

use crate::domain::PERIOD_HOURS;

/// Number of cosine parameters.
pub const COSINE_PARAMS: usize = 3;

const OMEGA: f64 = 2.0 * PI / PERIOD_HOURS;

/// Predict `f(t)`.
pub fn predict(t: f64, amplitude: f64, phase: f64, offset: f64) -> f64 {
    amplitude * (OMEGA * (t - phase)).cos() + offset
}

/// Fill `∂f/∂[A, φ, O]` at `t`.
///
/// # Panics
/// Panics if `out` is shorter than [`COSINE_PARAMS`].
pub fn fill_jacobian_row(t: f64, amplitude: f64, phase: f64, out: &mut [f64]) {
    let theta = OMEGA * (t - phase);
    out[0] = theta.cos();
    out[1] = amplitude * OMEGA * theta.sin();
    out[2] = 1.0;
}

/// Sample the fitted curve at `n` evenly spaced timepoints over `[t_min, t_max]`.
pub fn sample_curve(
    amplitude: f64,
    phase: f64,
    offset: f64,
    t_min: f64,
    t_max: f64,
    n: usize,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, predict(t, amplitude, phase, offset))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_sits_at_phase() {
        let y = predict(14.0, 2.0, 14.0, 5.0);
        assert!((y - 7.0).abs() < 1e-12);
        let trough = predict(2.0, 2.0, 14.0, 5.0);
        assert!((trough - 3.0).abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let (a, phi, o, t) = (1.7, 9.5, 3.0, 5.25);
        let mut row = [0.0; COSINE_PARAMS];
        fill_jacobian_row(t, a, phi, &mut row);

        let h = 1e-6;
        let da = (predict(t, a + h, phi, o) - predict(t, a - h, phi, o)) / (2.0 * h);
        let dphi = (predict(t, a, phi + h, o) - predict(t, a, phi - h, o)) / (2.0 * h);
        let doff = (predict(t, a, phi, o + h) - predict(t, a, phi, o - h)) / (2.0 * h);

        assert!((row[0] - da).abs() < 1e-6);
        assert!((row[1] - dphi).abs() < 1e-6);
        assert!((row[2] - doff).abs() < 1e-6);
    }
}
