//! Per-group cosinor fit and rhythmicity classification.
//!
//! Given a group's summary points we:
//! - drop points whose mean is missing
//! - refuse to fit fewer than [`MIN_SUMMARY_POINTS`] points
//! - fit `A·cos(2π(t − φ)/24) + O` to the means by unweighted nonlinear
//!   least squares, starting from `A = 1`, `φ = 12`, `O = mean(means)`
//! - take `SE(A)` from the fit covariance and classify on `A ± 1.96·SE(A)`
//!
//! Every failure is folded into the returned [`CosineFit`]; nothing here
//! returns an error.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::domain::{
    Classification, CosineFit, GroupKey, MIN_SUMMARY_POINTS, SummaryPoint, Z_95,
};
use crate::math::{LeastSquaresProblem, SolverOptions, covariance, levenberg_marquardt};
use crate::models::{COSINE_PARAMS, fill_jacobian_row, predict};

const INITIAL_AMPLITUDE: f64 = 1.0;
const INITIAL_PHASE: f64 = 12.0;

/// Means over timepoints for one group.
struct CosinorProblem {
    t: Vec<f64>,
    y: Vec<f64>,
}

impl LeastSquaresProblem for CosinorProblem {
    fn n_params(&self) -> usize {
        COSINE_PARAMS
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.t.len(),
            self.t
                .iter()
                .zip(&self.y)
                .map(|(&t, &y)| y - predict(t, params[0], params[1], params[2])),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let mut j = DMatrix::zeros(self.t.len(), COSINE_PARAMS);
        let mut row = [0.0; COSINE_PARAMS];
        for (i, &t) in self.t.iter().enumerate() {
            fill_jacobian_row(t, params[0], params[1], &mut row);
            for (k, v) in row.iter().enumerate() {
                j[(i, k)] = *v;
            }
        }
        j
    }
}

/// Fit and classify one group.
pub fn fit_group(key: GroupKey, points: &[SummaryPoint], opts: &SolverOptions) -> CosineFit {
    let (t, y): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter(|p| p.mean.is_finite() && p.timepoint.is_finite())
        .map(|p| (p.timepoint, p.mean))
        .unzip();
    let n = t.len();

    if n < MIN_SUMMARY_POINTS {
        debug!(signal = %key.signal, condition = %key.condition, n, "too few summary points");
        return CosineFit::empty(key, Classification::InsufficientData, n);
    }

    let offset0 = y.iter().sum::<f64>() / n as f64;
    let problem = CosinorProblem { t, y };
    let initial = DVector::from_row_slice(&[INITIAL_AMPLITUDE, INITIAL_PHASE, offset0]);

    let solution = match levenberg_marquardt(&problem, initial, opts) {
        Ok(s) => s,
        Err(e) => {
            warn!(signal = %key.signal, condition = %key.condition, error = %e, "cosinor fit failed");
            return CosineFit::empty(key, Classification::FitFailed, n);
        }
    };

    let (amplitude, phase, offset) = (solution.params[0], solution.params[1], solution.params[2]);
    if !(amplitude.is_finite() && phase.is_finite() && offset.is_finite()) {
        warn!(signal = %key.signal, condition = %key.condition, "cosinor fit returned non-finite estimate");
        return CosineFit::empty(key, Classification::FitFailed, n);
    }

    let Some(cov) = covariance(&solution.jacobian, solution.rss) else {
        warn!(signal = %key.signal, condition = %key.condition, n, "no usable covariance for SE(A)");
        return CosineFit::empty(key, Classification::FitFailed, n);
    };
    let amplitude_se = cov[(0, 0)].sqrt();
    if !amplitude_se.is_finite() {
        warn!(signal = %key.signal, condition = %key.condition, "non-finite amplitude standard error");
        return CosineFit::empty(key, Classification::FitFailed, n);
    }

    let ci_lower = amplitude - Z_95 * amplitude_se;
    let ci_upper = amplitude + Z_95 * amplitude_se;
    let classification = classify_interval(ci_lower, ci_upper);

    debug!(
        signal = %key.signal,
        condition = %key.condition,
        iterations = solution.iterations,
        amplitude,
        phase,
        offset,
        amplitude_se,
        verdict = classification.as_str(),
        "cosinor fit"
    );

    CosineFit {
        key,
        amplitude,
        phase,
        offset,
        amplitude_se,
        ci_lower,
        ci_upper,
        classification,
        n_points: n,
    }
}

/// `Rhythmic` when the interval lies strictly on one side of zero.
pub fn classify_interval(lower: f64, upper: f64) -> Classification {
    if lower > 0.0 || upper < 0.0 {
        Classification::Rhythmic
    } else {
        Classification::NonRhythmic
    }
}
