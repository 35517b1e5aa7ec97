//! Shared pipeline logic used by the `rhythm`, `demo` and statistics commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> summarize -> fit every group -> classify
//!
//! The command handlers can then focus on presentation (printing, exports).

use std::path::Path;

use tracing::{info, warn};

use crate::data::{DemoConfig, generate_demo};
use crate::domain::RhythmConfig;
use crate::error::AppError;
use crate::io::ingest::{IngestedData, Table, load_observations};
use crate::math::SolverOptions;
use crate::rhythm::{RhythmAnalysis, analyze};
use crate::stats::{
    AnovaTable, LinearRegression, SurvivalAnalysis, SurvivalRecord, analyze_survival,
    linear_regression, two_way_anova,
};

/// All computed outputs of a single rhythm run.
#[derive(Debug, Clone)]
pub struct RhythmRun {
    pub ingest: IngestedData,
    pub analysis: RhythmAnalysis,
}

/// Load the configured CSV and fit every group.
pub fn run_rhythm(config: &RhythmConfig) -> Result<RhythmRun, AppError> {
    let ingest = load_observations(config)?;
    Ok(run_rhythm_on(ingest, config))
}

/// Fit every group of already-ingested observations.
///
/// Never fails: group-level problems end up in the classifications.
pub fn run_rhythm_on(ingest: IngestedData, config: &RhythmConfig) -> RhythmRun {
    let opts = SolverOptions {
        max_iterations: config.max_iterations,
        ..SolverOptions::default()
    };
    let analysis = analyze(&ingest.observations, &config.condition_order, &opts);
    RhythmRun { ingest, analysis }
}

/// Generate demo observations and fit them.
pub fn run_demo(demo: &DemoConfig, config: &RhythmConfig) -> Result<RhythmRun, AppError> {
    let observations = generate_demo(demo)?;
    info!(
        seed = demo.seed,
        replicates = demo.replicates,
        observations = observations.len(),
        "generated demo data"
    );
    Ok(run_rhythm_on(IngestedData::from_observations(observations), config))
}

/// Regress `y` on `x` over the rows where both are present.
pub fn run_regression(path: &Path, x: &str, y: &str) -> Result<LinearRegression, AppError> {
    let table = Table::load(path)?;
    let xs = table.numeric_column(x)?;
    let ys = table.numeric_column(y)?;

    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .into_iter()
        .zip(ys)
        .filter_map(|(a, b)| Some((a?, b?)))
        .unzip();
    log_dropped("regression", table.len(), xs.len());

    linear_regression(&xs, &ys)
}

/// Two-way ANOVA over the rows where the response and both factors are present.
pub fn run_anova(path: &Path, response: &str, factor_a: &str, factor_b: &str) -> Result<AnovaTable, AppError> {
    let table = Table::load(path)?;
    let ys = table.numeric_column(response)?;
    let fa = table.text_column(factor_a)?;
    let fb = table.text_column(factor_b)?;

    let mut y = Vec::with_capacity(ys.len());
    let mut a = Vec::with_capacity(ys.len());
    let mut b = Vec::with_capacity(ys.len());
    for ((yi, ai), bi) in ys.into_iter().zip(fa).zip(fb) {
        if let (Some(yi), Some(ai), Some(bi)) = (yi, ai, bi) {
            y.push(yi);
            a.push(ai);
            b.push(bi);
        }
    }
    log_dropped("anova", table.len(), y.len());

    two_way_anova(&y, &a, &b, factor_a, factor_b)
}

/// Kaplan-Meier and log-rank over the rows with a time, an event flag and a group.
pub fn run_survival(path: &Path, time: &str, event: &str, group: &str) -> Result<SurvivalAnalysis, AppError> {
    let table = Table::load(path)?;
    let times = table.numeric_column(time)?;
    let events = table.flag_column(event)?;
    let groups = table.text_column(group)?;

    let records: Vec<SurvivalRecord> = times
        .into_iter()
        .zip(events)
        .zip(groups)
        .filter_map(|((t, e), g)| {
            Some(SurvivalRecord {
                group: g?,
                time: t?,
                event: e?,
            })
        })
        .collect();
    log_dropped("survival", table.len(), records.len());

    analyze_survival(&records)
}

fn log_dropped(pipeline: &str, rows: usize, kept: usize) {
    if kept < rows {
        warn!(pipeline, rows, kept, "dropped incomplete rows");
    } else {
        info!(pipeline, rows, "all rows complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Classification;

    fn temp_csv(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("toadlight-{name}-{}.csv", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn rhythm_run_reads_csv_and_fits() {
        let body = "\
gene,wavelength,zt,value
per1,blue,1,5.9
per1,blue,1,6.1
per1,blue,7,4.2
per1,blue,13,3.9
per1,blue,13,
per1,blue,19,5.8
per1,red,1,5.0
per1,red,13,bad
";
        let path = temp_csv("rhythm", body);
        let config = RhythmConfig {
            csv_path: path.clone(),
            condition_order: vec!["red".to_string(), "blue".to_string()],
            ..RhythmConfig::default()
        };
        let run = run_rhythm(&config).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(run.ingest.rows_read, 8);
        assert_eq!(run.ingest.missing_values, 2);
        assert_eq!(run.analysis.fits.len(), 2);
        assert_eq!(run.analysis.fits[0].key.condition, "red");
        assert_eq!(run.analysis.fits[0].classification, Classification::InsufficientData);
        // Means 6.0, 4.2, 3.9, 5.8 at ZT 1/7/13/19: |A| = sqrt(1.05² + 0.8²),
        // RSS = 4 · 0.025² on 1 df, so SE(A) = sqrt(0.0025 / 2).
        let blue = &run.analysis.fits[1];
        assert_eq!(blue.classification, Classification::Rhythmic);
        assert_eq!(blue.n_points, 4);
        assert!((blue.amplitude.abs() - 1.7425_f64.sqrt()).abs() < 1e-4, "A={}", blue.amplitude);
        assert!((blue.offset - 4.975).abs() < 1e-4, "O={}", blue.offset);
        assert!((blue.amplitude_se - 0.00125_f64.sqrt()).abs() < 1e-4, "se={}", blue.amplitude_se);
    }

    #[test]
    fn demo_run_covers_every_group() {
        let run = run_demo(&DemoConfig::default(), &RhythmConfig::default()).unwrap();
        assert_eq!(run.analysis.fits.len(), 16);

        let per2_red = run
            .analysis
            .fits
            .iter()
            .find(|f| f.key.signal == "per2" && f.key.condition == "red")
            .unwrap();
        assert_eq!(per2_red.classification, Classification::InsufficientData);
        assert!(run.analysis.count(Classification::Rhythmic) > 0);
    }

    #[test]
    fn regression_skips_incomplete_rows() {
        let path = temp_csv("regress", "nm,activity\n450,2.0\n500,2.5\n550,\n600,3.6\n650,4.0\n");
        let fit = run_regression(&path, "nm", "activity").unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(fit.n, 4);
        assert!(fit.slope.estimate > 0.0);
    }

    #[test]
    fn survival_reads_flags() {
        let path = temp_csv(
            "survival",
            "wavelength,day,status\nred,3,dead\nred,5,dead\nred,9,alive\nblue,20,alive\nblue,12,dead\nblue,25,alive\n",
        );
        let analysis = run_survival(&path, "day", "status", "wavelength").unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(analysis.curves.len(), 2);
        assert_eq!(analysis.curves[0].group, "red");
        assert_eq!(analysis.log_rank.df, 1);
    }

    #[test]
    fn missing_column_is_input_error() {
        let path = temp_csv("anova", "cort,light,zt\n1,red,1\n");
        let err = run_anova(&path, "cort", "light", "sex").unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert_eq!(err.exit_code(), 2);
    }
}
