//! SVG charts, one file per group: means with SE error bars and the fitted cosine.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::debug;

use crate::domain::{CosineFit, SummaryPoint};
use crate::error::AppError;
use crate::models::sample_curve;
use crate::rhythm::RhythmAnalysis;

const CURVE_SAMPLES: usize = 200;

fn draw_err(e: impl std::fmt::Display) -> AppError {
    AppError::input(format!("Failed to draw SVG chart: {e}"))
}

/// Draw one group's chart to `path`.
pub fn write_group_svg(
    path: &Path,
    points: &[&SummaryPoint],
    fit: &CosineFit,
    size: (u32, u32),
) -> Result<(), AppError> {
    let usable: Vec<&SummaryPoint> = points.iter().copied().filter(|p| p.mean.is_finite()).collect();

    let (t_min, t_max) = usable
        .iter()
        .map(|p| p.timepoint)
        .fold(None, |acc: Option<(f64, f64)>, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
        .filter(|(lo, hi)| hi > lo)
        .unwrap_or((0.0, 24.0));

    let curve = if fit.classification.has_fit() {
        sample_curve(fit.amplitude, fit.phase, fit.offset, t_min, t_max, CURVE_SAMPLES)
    } else {
        Vec::new()
    };

    let half_bar = |p: &SummaryPoint| if p.se.is_finite() { p.se } else { 0.0 };
    let ys = usable
        .iter()
        .flat_map(|p| [p.mean - half_bar(p), p.mean + half_bar(p)])
        .chain(curve.iter().map(|&(_, y)| y))
        .filter(|y| y.is_finite());
    let (y_lo, y_hi) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    let (y_lo, y_hi) = if y_lo.is_finite() && y_hi > y_lo {
        let pad = (y_hi - y_lo) * 0.08;
        (y_lo - pad, y_hi + pad)
    } else if y_lo.is_finite() {
        (y_lo - 1.0, y_lo + 1.0)
    } else {
        (0.0, 1.0)
    };

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let caption = format!(
        "{} / {}: {}",
        fit.key.signal,
        fit.key.condition,
        fit.classification.display_name()
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(t_min..t_max, y_lo..y_hi)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc("Zeitgeber time (h)")
        .y_desc(fit.key.signal.as_str())
        .draw()
        .map_err(draw_err)?;

    if !curve.is_empty() {
        chart
            .draw_series(LineSeries::new(curve, BLUE.stroke_width(2)))
            .map_err(draw_err)?;
    }

    chart
        .draw_series(usable.iter().map(|p| {
            let h = half_bar(p);
            ErrorBar::new_vertical(p.timepoint, p.mean - h, p.mean, p.mean + h, BLACK.filled(), 8)
        }))
        .map_err(draw_err)?;
    chart
        .draw_series(
            usable
                .iter()
                .map(|p| Circle::new((p.timepoint, p.mean), 4, RED.filled())),
        )
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

/// One SVG per group under `dir`; returns the files written.
pub fn write_analysis_svgs(
    dir: &Path,
    analysis: &RhythmAnalysis,
    size: (u32, u32),
) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::input(format!("Failed to create SVG directory '{}': {e}", dir.display())))?;

    let mut written = Vec::with_capacity(analysis.fits.len());
    for fit in &analysis.fits {
        let points: Vec<&SummaryPoint> = analysis.points_for(&fit.key).collect();
        let path = dir.join(format!(
            "{}_{}.svg",
            file_stem(&fit.key.signal),
            file_stem(&fit.key.condition)
        ));
        write_group_svg(&path, &points, fit, size)?;
        debug!(path = %path.display(), "wrote SVG");
        written.push(path);
    }
    Ok(written)
}

/// Keep labels filesystem-safe.
fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use crate::math::SolverOptions;
    use crate::models::predict;
    use crate::rhythm::analyze;

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(file_stem("per2"), "per2");
        assert_eq!(file_stem("470 nm/blue"), "470_nm_blue");
    }

    #[test]
    fn writes_one_svg_per_group() {
        let mut obs = Vec::new();
        for &t in &[1.0, 5.0, 9.0, 13.0, 17.0, 21.0] {
            for d in [-0.2, 0.2] {
                obs.push(Observation {
                    signal: "per1".to_string(),
                    condition: "blue".to_string(),
                    timepoint: t,
                    value: predict(t, 1.0, 13.0, 5.0) + d,
                });
            }
        }
        obs.push(Observation {
            signal: "per1".to_string(),
            condition: "red".to_string(),
            timepoint: 1.0,
            value: 4.0,
        });
        let analysis = analyze(&obs, &[], &SolverOptions::default());

        let dir = std::env::temp_dir().join(format!("toadlight-svg-{}", std::process::id()));
        let files = write_analysis_svgs(&dir, &analysis, (480, 320)).unwrap();
        assert_eq!(files.len(), 2);
        for f in &files {
            let text = std::fs::read_to_string(f).unwrap();
            assert!(text.contains("<svg"));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
