//! Read/write rhythm report JSON files.
//!
//! The JSON report is the "portable" representation of a run:
//! - one rounded row per group (same content as the CSV export)
//! - run metadata (tool, timestamp, period)
//! - a precomputed fitted grid per fitted group for quick plotting
//!
//! The schema is defined by `domain::RhythmFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, PERIOD_HOURS, RhythmFile};
use crate::error::AppError;
use crate::models::sample_curve;
use crate::rhythm::RhythmAnalysis;

const GRID_POINTS: usize = 97;

/// Assemble the report for an analysis.
pub fn build_rhythm_file(analysis: &RhythmAnalysis) -> RhythmFile {
    let curves = analysis
        .fits
        .iter()
        .filter(|f| f.classification.has_fit())
        .map(|f| {
            let (t0, t1) = time_range(analysis.points_for(&f.key).map(|p| p.timepoint));
            let (timepoints, fitted) = sample_curve(f.amplitude, f.phase, f.offset, t0, t1, GRID_POINTS)
                .into_iter()
                .unzip();
            CurveGrid {
                signal: f.key.signal.clone(),
                condition: f.key.condition.clone(),
                timepoints,
                fitted,
            }
        })
        .collect();

    RhythmFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        generated_at: Utc::now(),
        period_hours: PERIOD_HOURS,
        fits: analysis.fits.iter().map(|f| f.to_row()).collect(),
        curves,
    }
}

/// Write a rhythm report JSON file.
pub fn write_rhythm_json(path: &Path, analysis: &RhythmAnalysis) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create report JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &build_rhythm_file(analysis))
        .map_err(|e| AppError::input(format!("Failed to write report JSON: {e}")))?;

    Ok(())
}

/// Read a rhythm report JSON file.
pub fn read_rhythm_json(path: &Path) -> Result<RhythmFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open report JSON '{}': {e}", path.display())))?;
    let report: RhythmFile =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid report JSON: {e}")))?;
    Ok(report)
}

/// Span of the observed timepoints, or one period when there is nothing usable.
fn time_range(timepoints: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = timepoints
        .filter(|t| t.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if !(lo.is_finite() && hi.is_finite()) || hi - lo < 1e-9 {
        (0.0, PERIOD_HOURS)
    } else {
        (lo, hi)
    }
}
