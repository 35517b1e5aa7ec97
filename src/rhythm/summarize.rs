//! Replicate summarization and group enumeration.
//!
//! Observations are collapsed to one [`SummaryPoint`] per
//! (signal, condition, timepoint). Missing values (NaN) are excluded from the
//! mean, SD and count.

use std::collections::{BTreeSet, HashMap};

use crate::domain::{GroupKey, Observation, SummaryPoint};

/// Collapse replicates to per-timepoint mean/SD/SE/n.
///
/// Output is sorted by signal, condition, then timepoint.
pub fn summarize(observations: &[Observation]) -> Vec<SummaryPoint> {
    // Keyed on the timepoint's bit pattern; `+ 0.0` folds -0.0 into 0.0.
    let mut buckets: HashMap<(&str, &str, u64), Vec<f64>> = HashMap::new();
    for obs in observations {
        if !obs.timepoint.is_finite() {
            continue;
        }
        let key = (
            obs.signal.as_str(),
            obs.condition.as_str(),
            (obs.timepoint + 0.0).to_bits(),
        );
        let values = buckets.entry(key).or_default();
        if obs.value.is_finite() {
            values.push(obs.value);
        }
    }

    let mut out: Vec<SummaryPoint> = buckets
        .into_iter()
        .map(|((signal, condition, bits), values)| {
            let (mean, sd) = mean_sd(&values);
            let n = values.len();
            let se = if n >= 2 { sd / (n as f64).sqrt() } else { f64::NAN };
            SummaryPoint {
                signal: signal.to_string(),
                condition: condition.to_string(),
                timepoint: f64::from_bits(bits),
                mean,
                sd,
                se,
                n,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        a.signal
            .cmp(&b.signal)
            .then_with(|| a.condition.cmp(&b.condition))
            .then_with(|| a.timepoint.total_cmp(&b.timepoint))
    });
    out
}

/// Enumerate every (signal, condition) pair in reporting order.
///
/// Signals are sorted lexicographically. Conditions follow `condition_order`
/// first (entries absent from the data are skipped), then any remaining
/// conditions in order of first appearance. Pairs with no observations are
/// still returned.
pub fn enumerate_groups(observations: &[Observation], condition_order: &[String]) -> Vec<GroupKey> {
    let signals: BTreeSet<&str> = observations.iter().map(|o| o.signal.as_str()).collect();

    let mut seen: Vec<&str> = Vec::new();
    for obs in observations {
        if !seen.contains(&obs.condition.as_str()) {
            seen.push(obs.condition.as_str());
        }
    }

    let mut conditions: Vec<&str> = condition_order
        .iter()
        .map(String::as_str)
        .filter(|c| seen.contains(c))
        .collect();
    for c in seen {
        if !conditions.contains(&c) {
            conditions.push(c);
        }
    }

    signals
        .iter()
        .flat_map(|s| {
            conditions.iter().map(move |c| GroupKey {
                signal: (*s).to_string(),
                condition: (*c).to_string(),
            })
        })
        .collect()
}

/// Mean and sample SD; mean is NaN for no values, SD is NaN for fewer than two.
fn mean_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n as f64 - 1.0)).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(signal: &str, condition: &str, t: f64, v: f64) -> Observation {
        Observation {
            signal: signal.to_string(),
            condition: condition.to_string(),
            timepoint: t,
            value: v,
        }
    }

    #[test]
    fn replicates_collapse_with_missing_excluded() {
        let data = vec![
            obs("bmal1", "blue", 6.0, 2.0),
            obs("bmal1", "blue", 6.0, 4.0),
            obs("bmal1", "blue", 6.0, f64::NAN),
            obs("bmal1", "blue", 0.0, 7.0),
        ];

        let summary = summarize(&data);
        assert_eq!(summary.len(), 2);

        // Sorted by timepoint within the group.
        assert_eq!(summary[0].timepoint, 0.0);
        assert_eq!(summary[0].n, 1);
        assert_eq!(summary[0].mean, 7.0);
        assert!(summary[0].se.is_nan());

        let p = &summary[1];
        assert_eq!(p.n, 2);
        assert!((p.mean - 3.0).abs() < 1e-12);
        assert!((p.sd - 2f64.sqrt()).abs() < 1e-12);
        assert!((p.se - 1.0).abs() < 1e-12);
    }

    #[test]
    fn all_missing_timepoint_has_nan_mean() {
        let data = vec![obs("cort", "red", 12.0, f64::NAN)];
        let summary = summarize(&data);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].n, 0);
        assert!(summary[0].mean.is_nan());
    }

    #[test]
    fn groups_follow_configured_condition_order() {
        let data = vec![
            obs("per2", "white", 0.0, 1.0),
            obs("clock", "red", 0.0, 1.0),
            obs("per2", "blue", 0.0, 1.0),
        ];
        let order = vec!["blue".to_string(), "green".to_string()];

        let keys = enumerate_groups(&data, &order);
        let labels: Vec<(String, String)> = keys
            .into_iter()
            .map(|k| (k.signal, k.condition))
            .collect();

        let expected = [
            ("clock", "blue"),
            ("clock", "white"),
            ("clock", "red"),
            ("per2", "blue"),
            ("per2", "white"),
            ("per2", "red"),
        ];
        assert_eq!(labels.len(), expected.len());
        for ((s, c), (es, ec)) in labels.iter().zip(expected) {
            assert_eq!(s, es);
            assert_eq!(c, ec);
        }
    }
}
