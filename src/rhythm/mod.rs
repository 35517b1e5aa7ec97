//! Circadian rhythm fitting.
//!
//! Responsibilities:
//!
//! - collapse replicate observations to per-timepoint summaries
//! - enumerate (signal, condition) groups in reporting order
//! - fit a 24 h cosine to each group independently (parallel)
//! - classify each group from its amplitude confidence interval

pub mod fitter;
pub mod summarize;

pub use fitter::*;
pub use summarize::*;

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::info;

use crate::domain::{Classification, CosineFit, GroupKey, Observation, SummaryPoint};
use crate::math::SolverOptions;

/// Summaries and fits for one run.
#[derive(Debug, Clone)]
pub struct RhythmAnalysis {
    pub summary: Vec<SummaryPoint>,
    /// One fit per group, in reporting order.
    pub fits: Vec<CosineFit>,
}

impl RhythmAnalysis {
    /// Summary points belonging to one group (sorted by timepoint).
    pub fn points_for<'a>(&'a self, key: &'a GroupKey) -> impl Iterator<Item = &'a SummaryPoint> + 'a {
        self.summary
            .iter()
            .filter(move |p| p.signal == key.signal && p.condition == key.condition)
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.fits
            .iter()
            .filter(|f| f.classification == classification)
            .count()
    }
}

/// Summarize, enumerate groups, and fit every group.
pub fn analyze(
    observations: &[Observation],
    condition_order: &[String],
    opts: &SolverOptions,
) -> RhythmAnalysis {
    let summary = summarize(observations);
    let keys = enumerate_groups(observations, condition_order);

    let mut by_group: HashMap<GroupKey, Vec<SummaryPoint>> = HashMap::new();
    for p in &summary {
        by_group
            .entry(GroupKey {
                signal: p.signal.clone(),
                condition: p.condition.clone(),
            })
            .or_default()
            .push(p.clone());
    }

    // Groups share nothing mutable; order is restored by the indexed collect.
    let fits: Vec<CosineFit> = keys
        .into_par_iter()
        .map(|key| {
            let points = by_group.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            fit_group(key, points, opts)
        })
        .collect();

    let analysis = RhythmAnalysis { summary, fits };
    info!(
        groups = analysis.fits.len(),
        rhythmic = analysis.count(Classification::Rhythmic),
        non_rhythmic = analysis.count(Classification::NonRhythmic),
        fit_failed = analysis.count(Classification::FitFailed),
        insufficient = analysis.count(Classification::InsufficientData),
        "rhythm analysis complete"
    );
    analysis
}
