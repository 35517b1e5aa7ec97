//! Two-way ANOVA with interaction (`y ~ A * B`).
//!
//! Sums of squares are sequential (type I): each term is credited with the
//! RSS drop it produces when added after the terms before it, in the order
//! A, B, A:B. Factors use treatment (dummy) coding against their first level.
//! Rank-deficient designs (empty cells) are handled by taking degrees of
//! freedom from the numerical rank of each nested design.
//!
//! Each term is followed by Tukey HSD comparisons (see [`crate::stats::tukey`])
//! on the residual mean square of the full model: levels of A, levels of B
//! and the observed A:B cells.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::AppError;
use crate::math::fit_least_squares;
use crate::stats::tukey::{TukeyHsd, tukey_hsd};

#[derive(Debug, Clone, PartialEq)]
pub struct AnovaRow {
    pub term: String,
    pub df: usize,
    pub sum_sq: f64,
    pub mean_sq: f64,
    /// NaN for the residual row and for fully aliased terms.
    pub f_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone)]
pub struct AnovaTable {
    /// A, B, A:B, then Residuals.
    pub rows: Vec<AnovaRow>,
    pub levels_a: Vec<String>,
    pub levels_b: Vec<String>,
    pub n: usize,
    /// Post-hoc comparisons for A, B and A:B, in that order.
    pub post_hoc: Vec<TukeyHsd>,
}

impl AnovaTable {
    pub fn term(&self, name: &str) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.term == name)
    }
}

pub fn two_way_anova(
    response: &[f64],
    factor_a: &[String],
    factor_b: &[String],
    name_a: &str,
    name_b: &str,
) -> Result<AnovaTable, AppError> {
    let n = response.len();
    if factor_a.len() != n || factor_b.len() != n {
        return Err(AppError::input("ANOVA inputs differ in length."));
    }

    let levels_a = levels(factor_a);
    let levels_b = levels(factor_b);
    if levels_a.len() < 2 || levels_b.len() < 2 {
        return Err(AppError::insufficient(format!(
            "Two-way ANOVA needs at least 2 levels per factor ({name_a}: {}, {name_b}: {}).",
            levels_a.len(),
            levels_b.len()
        )));
    }

    let code_a = codes(factor_a, &levels_a);
    let code_b = codes(factor_b, &levels_b);

    // Nested designs: 1 | 1 + A | 1 + A + B | 1 + A + B + A:B
    let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n]];
    let mut nested = Vec::with_capacity(4);
    nested.push(columns.clone());

    for level in 1..levels_a.len() {
        columns.push(indicator(&code_a, level));
    }
    nested.push(columns.clone());

    for level in 1..levels_b.len() {
        columns.push(indicator(&code_b, level));
    }
    nested.push(columns.clone());

    for la in 1..levels_a.len() {
        for lb in 1..levels_b.len() {
            columns.push(
                code_a
                    .iter()
                    .zip(&code_b)
                    .map(|(&a, &b)| if a == la && b == lb { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
    }
    nested.push(columns);

    let y = DVector::from_row_slice(response);
    let mut fits = Vec::with_capacity(nested.len());
    for cols in &nested {
        let design = DMatrix::from_fn(n, cols.len(), |i, j| cols[j][i]);
        let fit = fit_least_squares(&design, &y)
            .ok_or_else(|| AppError::numeric("ANOVA design could not be solved."))?;
        fits.push((fit.rss, fit.rank));
    }

    let (rss_full, rank_full) = fits[3];
    if n <= rank_full {
        return Err(AppError::insufficient(format!(
            "No residual degrees of freedom: n={n}, model rank={rank_full}."
        )));
    }
    let df_res = n - rank_full;
    let ms_res = rss_full / df_res as f64;

    let f_dist = |df1: usize| {
        FisherSnedecor::new(df1 as f64, df_res as f64)
            .map_err(|e| AppError::numeric(format!("F distribution error: {e}")))
    };

    let terms = [
        name_a.to_string(),
        name_b.to_string(),
        format!("{name_a}:{name_b}"),
    ];
    let mut rows = Vec::with_capacity(4);
    for (k, term) in terms.into_iter().enumerate() {
        let (rss_prev, rank_prev) = fits[k];
        let (rss_next, rank_next) = fits[k + 1];
        let df = rank_next.saturating_sub(rank_prev);
        let sum_sq = (rss_prev - rss_next).max(0.0);

        let (mean_sq, f_value, p_value) = if df == 0 {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            let mean_sq = sum_sq / df as f64;
            let f_value = mean_sq / ms_res;
            let p_value = if f_value.is_finite() {
                f_dist(df)?.sf(f_value)
            } else {
                f64::NAN
            };
            (mean_sq, f_value, p_value)
        };

        rows.push(AnovaRow {
            term,
            df,
            sum_sq,
            mean_sq,
            f_value,
            p_value,
        });
    }

    let cells: Vec<String> = factor_a
        .iter()
        .zip(factor_b)
        .map(|(a, b)| format!("{a}:{b}"))
        .collect();
    let post_hoc = vec![
        tukey_hsd(&rows[0].term, response, factor_a, ms_res, df_res)?,
        tukey_hsd(&rows[1].term, response, factor_b, ms_res, df_res)?,
        tukey_hsd(&rows[2].term, response, &cells, ms_res, df_res)?,
    ];

    rows.push(AnovaRow {
        term: "Residuals".to_string(),
        df: df_res,
        sum_sq: rss_full,
        mean_sq: ms_res,
        f_value: f64::NAN,
        p_value: f64::NAN,
    });

    Ok(AnovaTable {
        rows,
        levels_a,
        levels_b,
        n,
        post_hoc,
    })
}

/// Distinct labels in order of first appearance.
fn levels(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for l in labels {
        if !out.contains(l) {
            out.push(l.clone());
        }
    }
    out
}

fn codes(labels: &[String], levels: &[String]) -> Vec<usize> {
    labels
        .iter()
        .map(|l| levels.iter().position(|x| x == l).unwrap_or(0))
        .collect()
}

fn indicator(codes: &[usize], level: usize) -> Vec<f64> {
    codes
        .iter()
        .map(|&c| if c == level { 1.0 } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn balanced_two_by_two() {
        // Cell means: (red,day)=2, (red,night)=4, (blue,day)=6, (blue,night)=8,
        // each cell ±1.
        let y = [1.0, 3.0, 3.0, 5.0, 5.0, 7.0, 7.0, 9.0];
        let a = labels(&["red", "red", "red", "red", "blue", "blue", "blue", "blue"]);
        let b = labels(&["day", "day", "night", "night", "day", "day", "night", "night"]);

        let table = two_way_anova(&y, &a, &b, "light", "phase").unwrap();
        assert_eq!(table.rows.len(), 4);

        let light = table.term("light").unwrap();
        assert_eq!(light.df, 1);
        assert!((light.sum_sq - 32.0).abs() < 1e-9);

        let phase = table.term("phase").unwrap();
        assert!((phase.sum_sq - 8.0).abs() < 1e-9);

        let inter = table.term("light:phase").unwrap();
        assert!(inter.sum_sq.abs() < 1e-9);
        assert!(inter.p_value > 0.99);

        let resid = table.term("Residuals").unwrap();
        assert_eq!(resid.df, 4);
        assert!((resid.sum_sq - 8.0).abs() < 1e-9);

        // F = 32 / (8/4) = 16 on (1, 4) df.
        assert!((light.f_value - 16.0).abs() < 1e-9);
        assert!(light.p_value > 0.01 && light.p_value < 0.02);
    }

    #[test]
    fn tukey_letters_on_the_cells() {
        // Same design: cell means 2, 4, 6, 8 with MS_res = 2 on 4 df and two
        // animals per cell, so SE = 1 and q equals the mean difference.
        let y = [1.0, 3.0, 3.0, 5.0, 5.0, 7.0, 7.0, 9.0];
        let a = labels(&["red", "red", "red", "red", "blue", "blue", "blue", "blue"]);
        let b = labels(&["day", "day", "night", "night", "day", "day", "night", "night"]);
        let table = two_way_anova(&y, &a, &b, "light", "phase").unwrap();

        assert_eq!(table.post_hoc.len(), 3);
        let cells = &table.post_hoc[2];
        assert_eq!(cells.term, "light:phase");
        assert_eq!(cells.groups.len(), 4);
        assert_eq!(cells.comparisons.len(), 6);
        // q(0.95; 4, 4) is about 5.76.
        assert!((cells.q_critical - 5.757).abs() < 0.02, "q={}", cells.q_critical);

        let extremes = cells.comparison("red:day", "blue:night").unwrap();
        assert!((extremes.q - 6.0).abs() < 1e-9);
        assert!(extremes.p_adj > 0.01 && extremes.p_adj < 0.05, "p={}", extremes.p_adj);
        let near = cells.comparison("red:night", "blue:night").unwrap();
        assert!((near.q - 4.0).abs() < 1e-9);
        assert!(near.p_adj > 0.05);

        assert_eq!(cells.letters("blue:night"), Some("a"));
        assert_eq!(cells.letters("blue:day"), Some("ab"));
        assert_eq!(cells.letters("red:night"), Some("ab"));
        assert_eq!(cells.letters("red:day"), Some("b"));

        let light = &table.post_hoc[0];
        let red_blue = light.comparison("red", "blue").unwrap();
        assert!((red_blue.diff - 4.0).abs() < 1e-12);
        assert!(red_blue.is_significant());
        assert_eq!(light.letters("blue"), Some("a"));
        assert_eq!(light.letters("red"), Some("b"));
    }

    #[test]
    fn single_level_factor_is_rejected() {
        let y = [1.0, 2.0, 3.0];
        let a = labels(&["red", "red", "red"]);
        let b = labels(&["day", "night", "day"]);
        assert!(two_way_anova(&y, &a, &b, "light", "phase").is_err());
    }
}
