//! Tukey HSD post-hoc comparisons and compact letter displays.
//!
//! Pairwise differences use the Tukey-Kramer standard error
//! `sqrt(MS_res / 2 · (1/n_i + 1/n_j))` with the residual mean square of the
//! fitted ANOVA model. Adjusted p-values come from the studentized range
//! distribution, integrated numerically over statrs' normal and chi-squared
//! densities.

use rayon::prelude::*;
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF, Normal};

use crate::error::AppError;

/// Family-wise level for the intervals and the grouping letters.
pub const TUKEY_ALPHA: f64 = 0.05;

const INNER_PANELS: usize = 160;
const OUTER_PANELS: usize = 240;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Range of `k` standard normals divided by an independent `sqrt(χ²_ν / ν)`.
#[derive(Debug, Clone)]
pub struct StudentizedRange {
    k: usize,
    df: f64,
    normal: Normal,
    chi: ChiSquared,
}

impl StudentizedRange {
    pub fn new(k: usize, df: f64) -> Result<Self, AppError> {
        if k < 2 {
            return Err(AppError::insufficient(format!(
                "Studentized range needs at least 2 groups, got {k}."
            )));
        }
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AppError::numeric(format!("normal distribution error: {e}")))?;
        let chi = ChiSquared::new(df)
            .map_err(|e| AppError::numeric(format!("chi-squared distribution error: {e}")))?;
        Ok(Self { k, df, normal, chi })
    }

    /// `P(range of k standard normals <= w)`.
    fn range_cdf(&self, w: f64) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        let power = self.k as i32 - 1;
        let integrand = |z: f64| {
            let inner = (self.normal.cdf(z) - self.normal.cdf(z - w)).max(0.0);
            self.normal.pdf(z) * inner.powi(power)
        };
        (self.k as f64 * simpson(integrand, -8.0, 8.0, INNER_PANELS)).clamp(0.0, 1.0)
    }

    pub fn cdf(&self, q: f64) -> f64 {
        if q.is_nan() {
            return f64::NAN;
        }
        if q <= 0.0 {
            return 0.0;
        }
        if q.is_infinite() {
            return 1.0;
        }

        // Integrate over s = sqrt(χ²_ν / ν), truncated where the χ² tails vanish.
        let nu = self.df;
        let spread = (2.0 * nu).sqrt();
        let s_lo = ((nu - 12.0 * spread).max(0.0) / nu).sqrt();
        let s_hi = ((nu + 12.0 * spread + 30.0) / nu).sqrt();
        let integrand = |s: f64| {
            if s <= 0.0 {
                return 0.0;
            }
            let density = 2.0 * nu * s * self.chi.pdf(nu * s * s);
            density * self.range_cdf(q * s)
        };
        simpson(integrand, s_lo, s_hi, OUTER_PANELS).clamp(0.0, 1.0)
    }

    pub fn sf(&self, q: f64) -> f64 {
        1.0 - self.cdf(q)
    }

    /// Smallest `q` with `cdf(q) >= p`, by bisection.
    pub fn quantile(&self, p: f64) -> f64 {
        if !(0.0..1.0).contains(&p) {
            return f64::NAN;
        }
        let mut hi = 2.0;
        while self.cdf(hi) < p && hi < 1e4 {
            hi *= 2.0;
        }
        let mut lo = 0.0;
        for _ in 0..40 {
            let mid = 0.5 * (lo + hi);
            if self.cdf(mid) < p {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

/// Composite Simpson rule; `panels` is rounded up to even.
fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64, panels: usize) -> f64 {
    let panels = panels + panels % 2;
    let h = (b - a) / panels as f64;
    let mut sum = f(a) + f(b);
    for i in 1..panels {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }
    sum * h / 3.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct TukeyGroup {
    pub label: String,
    pub mean: f64,
    pub n: usize,
    /// Groups sharing a letter are not significantly different.
    pub letters: String,
}

/// `second − first`, as in R's `TukeyHSD`.
#[derive(Debug, Clone, PartialEq)]
pub struct TukeyComparison {
    pub first: String,
    pub second: String,
    pub diff: f64,
    pub lower: f64,
    pub upper: f64,
    pub q: f64,
    pub p_adj: f64,
}

impl TukeyComparison {
    pub fn is_significant(&self) -> bool {
        self.p_adj < TUKEY_ALPHA
    }
}

#[derive(Debug, Clone)]
pub struct TukeyHsd {
    pub term: String,
    pub q_critical: f64,
    /// Groups in order of first appearance.
    pub groups: Vec<TukeyGroup>,
    pub comparisons: Vec<TukeyComparison>,
}

impl TukeyHsd {
    pub fn comparison(&self, first: &str, second: &str) -> Option<&TukeyComparison> {
        self.comparisons.iter().find(|c| {
            (c.first == first && c.second == second) || (c.first == second && c.second == first)
        })
    }

    pub fn letters(&self, label: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.label == label)
            .map(|g| g.letters.as_str())
    }
}

/// Tukey HSD of `response` across the groups named by `labels`.
pub fn tukey_hsd(
    term: &str,
    response: &[f64],
    labels: &[String],
    ms_res: f64,
    df_res: usize,
) -> Result<TukeyHsd, AppError> {
    if response.len() != labels.len() {
        return Err(AppError::input("Tukey inputs differ in length."));
    }
    if !ms_res.is_finite() || df_res == 0 {
        return Err(AppError::numeric(format!(
            "Tukey HSD needs a finite residual mean square on positive df (MS={ms_res}, df={df_res})."
        )));
    }

    let mut names: Vec<String> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for (y, label) in response.iter().zip(labels) {
        let idx = match names.iter().position(|n| n == label) {
            Some(i) => i,
            None => {
                names.push(label.clone());
                sums.push(0.0);
                counts.push(0);
                names.len() - 1
            }
        };
        sums[idx] += y;
        counts[idx] += 1;
    }
    let means: Vec<f64> = sums.iter().zip(&counts).map(|(s, &c)| s / c as f64).collect();

    let dist = StudentizedRange::new(names.len(), df_res as f64)?;
    let q_critical = dist.quantile(1.0 - TUKEY_ALPHA);

    let pairs: Vec<(usize, usize)> = (0..names.len())
        .flat_map(|i| (i + 1..names.len()).map(move |j| (i, j)))
        .collect();
    let comparisons: Vec<TukeyComparison> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let diff = means[j] - means[i];
            let se = (ms_res / 2.0 * (1.0 / counts[i] as f64 + 1.0 / counts[j] as f64)).sqrt();
            let q = if se > 0.0 {
                diff.abs() / se
            } else if diff == 0.0 {
                0.0
            } else {
                f64::INFINITY
            };
            TukeyComparison {
                first: names[i].clone(),
                second: names[j].clone(),
                diff,
                lower: diff - q_critical * se,
                upper: diff + q_critical * se,
                q,
                p_adj: dist.sf(q).clamp(0.0, 1.0),
            }
        })
        .collect();

    let significant: Vec<(usize, usize)> = pairs
        .iter()
        .zip(&comparisons)
        .filter(|(_, c)| c.is_significant())
        .map(|(&pair, _)| pair)
        .collect();
    let letters = compact_letters(&means, &significant);

    let groups = names
        .into_iter()
        .zip(means)
        .zip(counts)
        .zip(letters)
        .map(|(((label, mean), n), letters)| TukeyGroup {
            label,
            mean,
            n,
            letters,
        })
        .collect();

    Ok(TukeyHsd {
        term: term.to_string(),
        q_critical,
        groups,
        comparisons,
    })
}

/// Insert-and-absorb letter display over the significant pairs.
///
/// Letters are handed out starting from the group with the highest mean.
pub fn compact_letters(means: &[f64], significant: &[(usize, usize)]) -> Vec<String> {
    let k = means.len();
    let mut columns: Vec<Vec<bool>> = vec![vec![true; k]];
    for &(i, j) in significant {
        let mut next = Vec::with_capacity(columns.len() + 1);
        for col in columns {
            if col[i] && col[j] {
                let mut without_i = col.clone();
                without_i[i] = false;
                let mut without_j = col;
                without_j[j] = false;
                next.push(without_i);
                next.push(without_j);
            } else {
                next.push(col);
            }
        }
        columns = absorb(next);
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| means[b].total_cmp(&means[a]).then(a.cmp(&b)));
    let mut rank = vec![0; k];
    for (r, &g) in order.iter().enumerate() {
        rank[g] = r;
    }

    let member_ranks = |col: &Vec<bool>| -> Vec<usize> {
        let mut ranks: Vec<usize> = (0..k).filter(|&g| col[g]).map(|g| rank[g]).collect();
        ranks.sort_unstable();
        ranks
    };
    columns.sort_by_key(|col| member_ranks(col));

    let mut out = vec![String::new(); k];
    for (c, col) in columns.iter().enumerate() {
        let letter = LETTERS.get(c).map_or('+', |&b| b as char);
        for g in (0..k).filter(|&g| col[g]) {
            out[g].push(letter);
        }
    }
    out
}

/// Drop duplicate columns and columns contained in another one.
fn absorb(columns: Vec<Vec<bool>>) -> Vec<Vec<bool>> {
    let subset = |a: &[bool], b: &[bool]| a.iter().zip(b).all(|(&x, &y)| !x || y);
    columns
        .iter()
        .enumerate()
        .filter(|&(idx, col)| {
            !columns.iter().enumerate().any(|(other_idx, other)| {
                other_idx != idx && subset(col, other) && (col != other || other_idx < idx)
            })
        })
        .map(|(_, col)| col.clone())
        .collect()
}
