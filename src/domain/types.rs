//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built once at ingest and shared read-only by every group fit
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Period of the fitted cosine, in hours.
pub const PERIOD_HOURS: f64 = 24.0;

/// Groups with fewer summary points than this are never fitted.
pub const MIN_SUMMARY_POINTS: usize = 3;

/// Normal critical value for the 95% amplitude interval.
pub const Z_95: f64 = 1.96;

/// A single replicate measurement.
///
/// `value` is NaN when the measurement is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub signal: String,
    pub condition: String,
    /// Zeitgeber time in hours (may exceed 24 after wrapping).
    pub timepoint: f64,
    pub value: f64,
}

/// Replicates collapsed to one point per (signal, condition, timepoint).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPoint {
    pub signal: String,
    pub condition: String,
    pub timepoint: f64,
    pub mean: f64,
    /// Sample standard deviation (NaN when `n < 2`).
    pub sd: f64,
    /// Standard error of the mean (NaN when `n < 2`).
    pub se: f64,
    /// Number of non-missing replicates.
    pub n: usize,
}

/// The unit of fitting: one signal under one condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub signal: String,
    pub condition: String,
}

/// Rhythmicity verdict for a group. Every variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    InsufficientData,
    FitFailed,
    Rhythmic,
    NonRhythmic,
}

impl Classification {
    /// Machine label used in exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::InsufficientData => "insufficient_data",
            Classification::FitFailed => "fit_failed",
            Classification::Rhythmic => "rhythmic",
            Classification::NonRhythmic => "non_rhythmic",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Classification::InsufficientData => "Too few points",
            Classification::FitFailed => "Fit error",
            Classification::Rhythmic => "Rhythmic",
            Classification::NonRhythmic => "Not rhythmic",
        }
    }

    /// Whether the group carries usable cosine parameters.
    pub fn has_fit(self) -> bool {
        matches!(self, Classification::Rhythmic | Classification::NonRhythmic)
    }
}

/// Cosine fit for one group (unrounded).
///
/// All numeric fields are NaN unless `classification.has_fit()`.
#[derive(Debug, Clone, PartialEq)]
pub struct CosineFit {
    pub key: GroupKey,
    pub amplitude: f64,
    pub phase: f64,
    pub offset: f64,
    pub amplitude_se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub classification: Classification,
    /// Summary points that entered the fit.
    pub n_points: usize,
}

impl CosineFit {
    /// A record with every numeric field set to NaN.
    pub fn empty(key: GroupKey, classification: Classification, n_points: usize) -> Self {
        Self {
            key,
            amplitude: f64::NAN,
            phase: f64::NAN,
            offset: f64::NAN,
            amplitude_se: f64::NAN,
            ci_lower: f64::NAN,
            ci_upper: f64::NAN,
            classification,
            n_points,
        }
    }

    /// Rounded, flat record for tables and exports.
    pub fn to_row(&self) -> RhythmRow {
        RhythmRow {
            signal: self.key.signal.clone(),
            condition: self.key.condition.clone(),
            amplitude: round_to(self.amplitude, 4),
            phase: round_to(self.phase, 2),
            offset: round_to(self.offset, 4),
            ci_lower: round_to(self.ci_lower, 4),
            ci_upper: round_to(self.ci_upper, 4),
            classification: self.classification,
            n_points: self.n_points,
        }
    }
}

/// Display/export form of a [`CosineFit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmRow {
    pub signal: String,
    pub condition: String,
    #[serde(with = "nan_as_null")]
    pub amplitude: f64,
    #[serde(with = "nan_as_null")]
    pub phase: f64,
    #[serde(with = "nan_as_null")]
    pub offset: f64,
    #[serde(with = "nan_as_null")]
    pub ci_lower: f64,
    #[serde(with = "nan_as_null")]
    pub ci_upper: f64,
    pub classification: Classification,
    pub n_points: usize,
}

/// JSON has no NaN: missing estimates are written as `null` and read back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Round to `decimals` places; NaN stays NaN.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// A rhythm run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RhythmConfig {
    pub csv_path: PathBuf,
    /// Fixed condition order for reporting; unlisted conditions follow in
    /// order of first appearance.
    pub condition_order: Vec<String>,
    /// Timepoints strictly below this hour are shifted by +24.
    pub wrap_before: Option<f64>,
    /// Signal id used when the input has no signal column.
    pub default_signal: String,
    /// Solver iteration cap.
    pub max_iterations: usize,

    pub show_summary: bool,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_csv: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
    pub svg_dir: Option<PathBuf>,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::new(),
            condition_order: Vec::new(),
            wrap_before: None,
            default_signal: "value".to_string(),
            max_iterations: 100,
            show_summary: false,
            plot: false,
            plot_width: 72,
            plot_height: 16,
            export_csv: None,
            export_summary: None,
            export_json: None,
            svg_dir: None,
        }
    }
}

/// A saved rhythm report (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhythmFile {
    pub tool: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub period_hours: f64,
    pub fits: Vec<RhythmRow>,
    pub curves: Vec<CurveGrid>,
}

/// Fitted cosine sampled on a regular grid, for plotting without refitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub signal: String,
    pub condition: String,
    pub timepoints: Vec<f64>,
    pub fitted: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_keeps_nan_and_rounds_half_away() {
        assert!(round_to(f64::NAN, 4).is_nan());
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(11.996, 2), 12.0);
        assert_eq!(round_to(-0.00004, 4), 0.0);
    }

    #[test]
    fn empty_fit_has_nan_fields() {
        let key = GroupKey {
            signal: "per2".to_string(),
            condition: "red".to_string(),
        };
        let fit = CosineFit::empty(key, Classification::InsufficientData, 2);
        let row = fit.to_row();
        assert!(row.amplitude.is_nan());
        assert!(row.phase.is_nan());
        assert!(row.offset.is_nan());
        assert!(row.ci_lower.is_nan() && row.ci_upper.is_nan());
        assert_eq!(row.classification, Classification::InsufficientData);
    }
}
