//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - summary means: `o`
//! - fitted cosine: `-` line

use crate::domain::{CosineFit, RhythmFile, SummaryPoint};
use crate::models::sample_curve;

/// Render one group: its timepoint means plus the fitted cosine (when there is one).
pub fn render_group_plot(points: &[&SummaryPoint], fit: &CosineFit, width: usize, height: usize) -> String {
    let obs: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.mean.is_finite())
        .map(|p| (p.timepoint, p.mean))
        .collect();
    let (t_min, t_max) = x_range(obs.iter().map(|p| p.0)).unwrap_or((0.0, 24.0));

    let curve = fit
        .classification
        .has_fit()
        .then(|| sample_curve(fit.amplitude, fit.phase, fit.offset, t_min, t_max, width.max(2)));

    let title = format!(
        "{} / {} [{}]",
        fit.key.signal,
        fit.key.condition,
        fit.classification.display_name()
    );
    render_plot(&title, &obs, curve.as_deref(), t_min, t_max, width, height)
}

/// Render every saved curve in a report file (curve only, no overlay points).
pub fn render_report_plots(report: &RhythmFile, width: usize, height: usize) -> String {
    let mut out = String::new();
    for c in &report.curves {
        let points: Vec<(f64, f64)> = c
            .timepoints
            .iter()
            .zip(c.fitted.iter())
            .map(|(&t, &y)| (t, y))
            .collect();
        let (t_min, t_max) = x_range(c.timepoints.iter().copied()).unwrap_or((0.0, 24.0));
        let title = format!("{} / {}", c.signal, c.condition);
        out.push_str(&render_plot(&title, &[], Some(&points), t_min, t_max, width, height));
        out.push('\n');
    }
    out
}

fn render_plot(
    title: &str,
    points: &[(f64, f64)],
    curve_points: Option<&[(f64, f64)]>,
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    // Determine y-range from observed points and curve points.
    let (y_min, y_max) = y_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);
    }

    for &(t, y) in points {
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(y, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    // Build final string. We include a small header with ranges.
    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {title} | t=[{t_min:.2}, {t_max:.2}] h | y=[{y_min:.2}, {y_max:.2}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn x_range(ts: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_t = f64::INFINITY;
    let mut max_t = f64::NEG_INFINITY;
    for t in ts.filter(|t| t.is_finite()) {
        min_t = min_t.min(t);
        max_t = max_t.max(t);
    }
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let curve = curve.unwrap_or(&[]);
    for &(_, y) in points.iter().chain(curve) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classification, GroupKey};

    #[test]
    fn plot_golden_snapshot_small() {
        let points = [(0.0, 100.0), (24.0, 110.0)];
        let curve = [(0.0, 100.0), (12.0, 100.0), (24.0, 100.0)];

        let txt = render_plot("per2 / blue", &points, Some(&curve), 0.0, 24.0, 10, 5);
        let expected = concat!(
            "Plot: per2 / blue | t=[0.00, 24.00] h | y=[99.50, 110.50]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn unfitted_group_shows_points_only() {
        let key = GroupKey {
            signal: "cry1".to_string(),
            condition: "red".to_string(),
        };
        let fit = CosineFit::empty(key, Classification::InsufficientData, 2);
        let pts = [
            SummaryPoint {
                signal: "cry1".to_string(),
                condition: "red".to_string(),
                timepoint: 0.0,
                mean: 1.0,
                sd: f64::NAN,
                se: f64::NAN,
                n: 1,
            },
            SummaryPoint {
                signal: "cry1".to_string(),
                condition: "red".to_string(),
                timepoint: 12.0,
                mean: 3.0,
                sd: f64::NAN,
                se: f64::NAN,
                n: 1,
            },
        ];
        let refs: Vec<&SummaryPoint> = pts.iter().collect();
        let txt = render_group_plot(&refs, &fit, 20, 6);

        assert!(txt.starts_with("Plot: cry1 / red [Too few points]"));
        let body: Vec<&str> = txt.lines().skip(1).collect();
        assert_eq!(body.len(), 6);
        assert!(body.iter().all(|l| !l.contains('-')));
        assert_eq!(body.iter().map(|l| l.matches('o').count()).sum::<usize>(), 2);
    }
}
