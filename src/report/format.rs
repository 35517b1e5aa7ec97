//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (snapshot-style tests below)

use crate::domain::{Classification, RhythmConfig, RhythmRow, SummaryPoint};
use crate::io::ingest::IngestedData;
use crate::rhythm::RhythmAnalysis;
use crate::stats::{AnovaTable, LinearRegression, SurvivalAnalysis};

/// Row errors listed before the rest are summarized as a count.
const MAX_LISTED_ROW_ERRORS: usize = 5;

/// Format the run header: dataset stats and classification counts.
pub fn format_run_summary(ingest: &IngestedData, analysis: &RhythmAnalysis, config: &RhythmConfig) -> String {
    let mut out = String::new();

    out.push_str("=== toadlight - circadian rhythm fits (24 h cosinor) ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Rows: read={} | used={} | missing values={} | rejected={}\n",
        ingest.rows_read,
        ingest.observations.len(),
        ingest.missing_values,
        ingest.row_errors.len(),
    ));
    for e in ingest.row_errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > MAX_LISTED_ROW_ERRORS {
        out.push_str(&format!(
            "  ... {} more\n",
            ingest.row_errors.len() - MAX_LISTED_ROW_ERRORS
        ));
    }
    if let Some(h) = config.wrap_before {
        out.push_str(&format!("Timepoints < {h} shifted by +24 h\n"));
    }

    out.push_str(&format!(
        "Groups: {} | rhythmic={} | not rhythmic={} | fit error={} | too few points={}\n",
        analysis.fits.len(),
        analysis.count(Classification::Rhythmic),
        analysis.count(Classification::NonRhythmic),
        analysis.count(Classification::FitFailed),
        analysis.count(Classification::InsufficientData),
    ));
    out.push('\n');

    out
}

/// One line per group: amplitude, phase, offset, CI and verdict.
pub fn format_rhythm_table(rows: &[RhythmRow]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<12} {:<12} {:>10} {:>7} {:>10} {:>10} {:>10} {:<15} {:>3}",
            "signal", "condition", "amplitude", "phase", "offset", "ci_lower", "ci_upper", "verdict", "n"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<12} {:-<12} {:-<10} {:-<7} {:-<10} {:-<10} {:-<10} {:-<15} {:-<3}",
            "", "", "", "", "", "", "", "", ""
        ),
    );

    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<12} {:<12} {:>10} {:>7} {:>10} {:>10} {:>10} {:<15} {:>3}",
                truncate(&r.signal, 12),
                truncate(&r.condition, 12),
                fmt_num(r.amplitude, 4),
                fmt_num(r.phase, 2),
                fmt_num(r.offset, 4),
                fmt_num(r.ci_lower, 4),
                fmt_num(r.ci_upper, 4),
                r.classification.display_name(),
                r.n_points,
            ),
        );
    }

    out
}

/// Mean ± SE per timepoint.
pub fn format_summary_table(summary: &[SummaryPoint]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<12} {:<12} {:>6} {:>10} {:>10} {:>3}",
            "signal", "condition", "t", "mean", "se", "n"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<12} {:-<12} {:-<6} {:-<10} {:-<10} {:-<3}", "", "", "", "", "", ""),
    );
    for p in summary {
        push_line(
            &mut out,
            format!(
                "{:<12} {:<12} {:>6} {:>10} {:>10} {:>3}",
                truncate(&p.signal, 12),
                truncate(&p.condition, 12),
                p.timepoint,
                fmt_num(p.mean, 4),
                fmt_num(p.se, 4),
                p.n,
            ),
        );
    }
    out
}

pub fn format_regression(fit: &LinearRegression, x_name: &str, y_name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Linear regression: {y_name} ~ {x_name} ===\n"));
    push_line(
        &mut out,
        format!("{:<12} {:>12} {:>12} {:>10} {:>10}", "term", "estimate", "std_error", "t", "p"),
    );
    push_line(&mut out, format!("{:-<12} {:-<12} {:-<12} {:-<10} {:-<10}", "", "", "", "", ""));
    for (name, c) in [("(intercept)", &fit.intercept), (x_name, &fit.slope)] {
        push_line(
            &mut out,
            format!(
                "{:<12} {:>12} {:>12} {:>10} {:>10}",
                truncate(name, 12),
                fmt_num(c.estimate, 4),
                fmt_num(c.std_error, 4),
                fmt_num(c.t_value, 3),
                fmt_p(c.p_value),
            ),
        );
    }
    out.push_str(&format!(
        "R^2={} | sigma={} | df={} | n={}\n",
        fmt_num(fit.r_squared, 4),
        fmt_num(fit.sigma, 4),
        fit.df_residual,
        fit.n
    ));
    out
}

pub fn format_anova(table: &AnovaTable, response: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Two-way ANOVA (type I): {response} ===\n"));
    push_line(
        &mut out,
        format!(
            "{:<20} {:>4} {:>12} {:>12} {:>9} {:>10}",
            "term", "df", "sum_sq", "mean_sq", "F", "p"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<20} {:-<4} {:-<12} {:-<12} {:-<9} {:-<10}", "", "", "", "", "", ""),
    );
    for r in &table.rows {
        let (f, p) = if r.term == "Residuals" {
            (String::new(), String::new())
        } else {
            (fmt_num(r.f_value, 3), fmt_p(r.p_value))
        };
        push_line(
            &mut out,
            format!(
                "{:<20} {:>4} {:>12} {:>12} {:>9} {:>10}",
                truncate(&r.term, 20),
                r.df,
                fmt_num(r.sum_sq, 4),
                fmt_num(r.mean_sq, 4),
                f,
                p,
            ),
        );
    }
    out.push_str(&format!("n={}\n", table.n));

    for hsd in &table.post_hoc {
        out.push_str(&format!(
            "\n--- Tukey HSD: {} (q crit {}) ---\n",
            hsd.term,
            fmt_num(hsd.q_critical, 3)
        ));
        push_line(
            &mut out,
            format!("{:<24} {:>4} {:>10} {:<8}", "group", "n", "mean", "letters"),
        );
        for g in &hsd.groups {
            push_line(
                &mut out,
                format!(
                    "{:<24} {:>4} {:>10} {:<8}",
                    truncate(&g.label, 24),
                    g.n,
                    fmt_num(g.mean, 4),
                    g.letters
                ),
            );
        }
        for c in &hsd.comparisons {
            push_line(
                &mut out,
                format!(
                    "  {} - {}: diff={} [{}, {}] p={}",
                    c.second,
                    c.first,
                    fmt_num(c.diff, 4),
                    fmt_num(c.lower, 4),
                    fmt_num(c.upper, 4),
                    fmt_p(c.p_adj)
                ),
            );
        }
    }
    out
}

pub fn format_survival(analysis: &SurvivalAnalysis) -> String {
    let mut out = String::new();
    out.push_str("=== Kaplan-Meier survival ===\n");
    push_line(
        &mut out,
        format!("{:<12} {:>5} {:>7} {:>10} {:>10} {:>10}", "group", "n", "events", "median", "observed", "expected"),
    );
    push_line(
        &mut out,
        format!("{:-<12} {:-<5} {:-<7} {:-<10} {:-<10} {:-<10}", "", "", "", "", "", ""),
    );
    let lr = &analysis.log_rank;
    for (i, km) in analysis.curves.iter().enumerate() {
        let median = km
            .median_survival()
            .map_or_else(|| "not reached".to_string(), |m| format!("{m}"));
        push_line(
            &mut out,
            format!(
                "{:<12} {:>5} {:>7} {:>10} {:>10} {:>10}",
                truncate(&km.group, 12),
                km.n,
                km.total_events(),
                median,
                fmt_num(lr.observed.get(i).copied().unwrap_or(f64::NAN), 1),
                fmt_num(lr.expected.get(i).copied().unwrap_or(f64::NAN), 2),
            ),
        );
    }
    out.push_str(&format!(
        "Log-rank: chi2={} | df={} | p={}\n",
        fmt_num(lr.statistic, 3),
        lr.df,
        fmt_p(lr.p_value)
    ));
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Fixed decimals; missing values print as `NA`.
fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "NA".to_string()
    }
}

fn fmt_p(p: f64) -> String {
    if !p.is_finite() {
        "NA".to_string()
    } else if p < 1e-4 {
        "<1e-4".to_string()
    } else {
        format!("{p:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(condition: &str, amplitude: f64, classification: Classification) -> RhythmRow {
        RhythmRow {
            signal: "per2".to_string(),
            condition: condition.to_string(),
            amplitude,
            phase: if amplitude.is_nan() { f64::NAN } else { 13.25 },
            offset: if amplitude.is_nan() { f64::NAN } else { 4.0 },
            ci_lower: if amplitude.is_nan() { f64::NAN } else { 0.5 },
            ci_upper: if amplitude.is_nan() { f64::NAN } else { 2.5 },
            classification,
            n_points: 6,
        }
    }

    #[test]
    fn rhythm_table_layout() {
        let rows = vec![
            row("blue", 1.5, Classification::Rhythmic),
            row("red", f64::NAN, Classification::FitFailed),
        ];
        let text = format_rhythm_table(&rows);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("signal"));
        assert!(lines[0].ends_with(" n"));
        assert_eq!(
            lines[2],
            "per2         blue             1.5000   13.25     4.0000     0.5000     2.5000 Rhythmic          6"
        );
        assert!(lines[3].contains("Fit error"));
        assert_eq!(lines[3].matches("NA").count(), 5);
    }

    #[test]
    fn p_values_are_floored_for_display() {
        assert_eq!(fmt_p(0.03127), "0.0313");
        assert_eq!(fmt_p(1e-9), "<1e-4");
        assert_eq!(fmt_p(f64::NAN), "NA");
    }

    #[test]
    fn truncate_marks_cut_labels() {
        assert_eq!(truncate("short", 12), "short");
        assert_eq!(truncate("melanopsin_opn4", 12), "melanopsin_.");
    }

    #[test]
    fn anova_report_lists_tukey_letters() {
        use crate::stats::{AnovaRow, TukeyComparison, TukeyGroup, TukeyHsd};

        let group = |label: &str, mean: f64, letters: &str| TukeyGroup {
            label: label.to_string(),
            mean,
            n: 4,
            letters: letters.to_string(),
        };
        let table = AnovaTable {
            rows: vec![AnovaRow {
                term: "Residuals".to_string(),
                df: 6,
                sum_sq: 1.2,
                mean_sq: 0.2,
                f_value: f64::NAN,
                p_value: f64::NAN,
            }],
            levels_a: vec!["red".to_string(), "blue".to_string()],
            levels_b: vec![],
            n: 8,
            post_hoc: vec![TukeyHsd {
                term: "light".to_string(),
                q_critical: 3.4612,
                groups: vec![group("red", 3.0, "b"), group("blue", 7.0, "a")],
                comparisons: vec![TukeyComparison {
                    first: "red".to_string(),
                    second: "blue".to_string(),
                    diff: 4.0,
                    lower: 3.1,
                    upper: 4.9,
                    q: 12.6,
                    p_adj: 0.00002,
                }],
            }],
        };

        let text = format_anova(&table, "cort");
        assert!(text.contains("--- Tukey HSD: light (q crit 3.461) ---"), "{text}");
        assert!(text.contains("blue                        4     7.0000 a"), "{text}");
        assert!(text.contains("  blue - red: diff=4.0000 [3.1000, 4.9000] p=<1e-4"), "{text}");
    }
}
