//! Kaplan-Meier survival curves and the log-rank test across light groups.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::AppError;

/// One animal: time to death (or end of follow-up) and whether it died.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalRecord {
    pub group: String,
    pub time: f64,
    /// `true` if the event (death) was observed, `false` if censored.
    pub event: bool,
}

/// Kaplan-Meier estimate for one group, one entry per distinct event time.
#[derive(Debug, Clone)]
pub struct KaplanMeierCurve {
    pub group: String,
    pub n: usize,
    pub times: Vec<f64>,
    pub survival_prob: Vec<f64>,
    pub at_risk: Vec<usize>,
    pub events: Vec<usize>,
}

impl KaplanMeierCurve {
    pub fn from_records(group: &str, records: &[&SurvivalRecord]) -> Self {
        let mut data: Vec<(f64, bool)> = records.iter().map(|r| (r.time, r.event)).collect();
        data.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut times = vec![];
        let mut survival_prob = vec![];
        let mut at_risk_vec = vec![];
        let mut events_vec = vec![];

        let mut current = 1.0;
        let total = data.len();

        let mut i = 0;
        while i < total {
            let t = data[i].0;
            let at_risk = total - i;

            let mut event_count = 0;
            let mut j = i;
            while j < total && data[j].0 == t {
                if data[j].1 {
                    event_count += 1;
                }
                j += 1;
            }

            if event_count > 0 {
                current *= 1.0 - event_count as f64 / at_risk as f64;
                times.push(t);
                survival_prob.push(current);
                at_risk_vec.push(at_risk);
                events_vec.push(event_count);
            }
            i = j;
        }

        Self {
            group: group.to_string(),
            n: total,
            times,
            survival_prob,
            at_risk: at_risk_vec,
            events: events_vec,
        }
    }

    /// First event time at which survival drops to 0.5 or below.
    pub fn median_survival(&self) -> Option<f64> {
        self.survival_prob
            .iter()
            .position(|&s| s <= 0.5)
            .map(|i| self.times[i])
    }

    /// Step-function survival at `time` (1.0 before the first event).
    pub fn survival_at(&self, time: f64) -> f64 {
        self.times
            .iter()
            .rposition(|&t| t <= time)
            .map_or(1.0, |i| self.survival_prob[i])
    }

    pub fn total_events(&self) -> usize {
        self.events.iter().sum()
    }
}

#[derive(Debug, Clone)]
pub struct LogRankResult {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
    pub groups: Vec<String>,
    pub observed: Vec<f64>,
    pub expected: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SurvivalAnalysis {
    pub curves: Vec<KaplanMeierCurve>,
    pub log_rank: LogRankResult,
}

/// Groups in order of first appearance.
fn group_labels(records: &[SurvivalRecord]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in records {
        if !out.contains(&r.group) {
            out.push(r.group.clone());
        }
    }
    out
}

fn validate(records: &[SurvivalRecord]) -> Result<(), AppError> {
    if records.is_empty() {
        return Err(AppError::insufficient("No survival records."));
    }
    if let Some(bad) = records.iter().find(|r| !r.time.is_finite() || r.time < 0.0) {
        return Err(AppError::input(format!(
            "Survival time must be finite and non-negative, got {} in group {}.",
            bad.time, bad.group
        )));
    }
    Ok(())
}

/// Log-rank test across all groups.
///
/// The statistic is `(O − E)ᵀ V⁻¹ (O − E)` over the first `k − 1` groups,
/// with `V` the hypergeometric covariance of the observed deaths, so it
/// matches the usual survdiff-style report rather than `Σ (O − E)² / E`.
pub fn log_rank_test(records: &[SurvivalRecord]) -> Result<LogRankResult, AppError> {
    validate(records)?;
    let groups = group_labels(records);
    let n_groups = groups.len();
    if n_groups < 2 {
        return Err(AppError::insufficient(
            "Log-rank test requires at least 2 groups.",
        ));
    }

    let mut data: Vec<(f64, bool, usize)> = records
        .iter()
        .map(|r| {
            let g = groups.iter().position(|x| x == &r.group).unwrap_or(0);
            (r.time, r.event, g)
        })
        .collect();
    data.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut risk = vec![0usize; n_groups];
    for &(_, _, g) in &data {
        risk[g] += 1;
    }

    let mut observed = vec![0.0; n_groups];
    let mut expected = vec![0.0; n_groups];
    let m = n_groups - 1;
    let mut variance = DMatrix::<f64>::zeros(m, m);

    let mut i = 0;
    while i < data.len() {
        let t = data[i].0;
        let mut deaths = vec![0usize; n_groups];
        let mut leaving = vec![0usize; n_groups];
        while i < data.len() && data[i].0 == t {
            let (_, event, g) = data[i];
            if event {
                deaths[g] += 1;
            }
            leaving[g] += 1;
            i += 1;
        }

        let d_total: usize = deaths.iter().sum();
        let n_total: usize = risk.iter().sum();
        if d_total > 0 && n_total > 0 {
            let (d, n) = (d_total as f64, n_total as f64);
            for g in 0..n_groups {
                observed[g] += deaths[g] as f64;
                expected[g] += risk[g] as f64 * d / n;
            }
            if n_total > 1 {
                let scale = d * (n - d) / (n - 1.0);
                for g in 0..m {
                    let pg = risk[g] as f64 / n;
                    for h in 0..m {
                        let ph = risk[h] as f64 / n;
                        let delta = if g == h { 1.0 } else { 0.0 };
                        variance[(g, h)] += scale * pg * (delta - ph);
                    }
                }
            }
        }
        for g in 0..n_groups {
            risk[g] -= leaving[g];
        }
    }

    let diff = DVector::from_iterator(m, observed.iter().zip(&expected).take(m).map(|(o, e)| o - e));
    // Groups with no one at risk at any death time make V singular.
    let inverse = variance
        .pseudo_inverse(1e-12)
        .map_err(|e| AppError::numeric(format!("log-rank variance could not be inverted: {e}")))?;
    let statistic = diff.dot(&(inverse * &diff)).max(0.0);

    let df = n_groups - 1;
    let chi = ChiSquared::new(df as f64)
        .map_err(|e| AppError::numeric(format!("chi-squared distribution error: {e}")))?;
    let p_value = chi.sf(statistic);

    Ok(LogRankResult {
        statistic,
        df,
        p_value,
        groups,
        observed,
        expected,
    })
}

/// Kaplan-Meier curve per group plus the log-rank comparison.
pub fn analyze_survival(records: &[SurvivalRecord]) -> Result<SurvivalAnalysis, AppError> {
    let log_rank = log_rank_test(records)?;
    let curves = log_rank
        .groups
        .iter()
        .map(|g| {
            let subset: Vec<&SurvivalRecord> = records.iter().filter(|r| &r.group == g).collect();
            KaplanMeierCurve::from_records(g, &subset)
        })
        .collect();
    Ok(SurvivalAnalysis { curves, log_rank })
}
