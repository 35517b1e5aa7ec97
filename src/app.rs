//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the requested pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{AnovaArgs, Command, DemoArgs, OutputArgs, PlotArgs, RegressArgs, RhythmArgs, SurvivalArgs};
use crate::data::DemoConfig;
use crate::domain::{RhythmConfig, SummaryPoint};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `toadlight` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Rhythm(args) => handle_rhythm(args),
        Command::Demo(args) => handle_demo(args),
        Command::Plot(args) => handle_plot(args),
        Command::Regress(args) => handle_regress(args),
        Command::Anova(args) => handle_anova(args),
        Command::Survival(args) => handle_survival(args),
    }
}

fn handle_rhythm(args: RhythmArgs) -> Result<(), AppError> {
    let config = rhythm_config_from_args(&args);
    let run = pipeline::run_rhythm(&config)?;
    present_rhythm(&run, &config)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let demo = DemoConfig {
        seed: args.seed,
        replicates: args.replicates,
        noise_sd: args.noise,
    };
    let mut config = RhythmConfig {
        csv_path: format!("<demo seed={}>", args.seed).into(),
        ..RhythmConfig::default()
    };
    apply_output_args(&mut config, &args.output);

    let run = pipeline::run_demo(&demo, &config)?;
    if let Some(path) = &args.export_data {
        crate::io::export::write_observations_csv(path, &run.ingest.observations)?;
        info!(path = %path.display(), "wrote demo observations");
    }
    present_rhythm(&run, &config)
}

/// Print tables/plots and write exports for a finished rhythm run.
fn present_rhythm(run: &pipeline::RhythmRun, config: &RhythmConfig) -> Result<(), AppError> {
    let analysis = &run.analysis;
    let rows: Vec<_> = analysis.fits.iter().map(|f| f.to_row()).collect();

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, analysis, config)
    );
    if config.show_summary {
        println!("{}", crate::report::format_summary_table(&analysis.summary));
    }
    println!("{}", crate::report::format_rhythm_table(&rows));

    if config.plot {
        for fit in &analysis.fits {
            let points: Vec<&SummaryPoint> = analysis.points_for(&fit.key).collect();
            println!(
                "{}",
                crate::plot::render_group_plot(&points, fit, config.plot_width, config.plot_height)
            );
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_csv {
        crate::io::export::write_rhythm_csv(path, &rows)?;
        info!(path = %path.display(), "wrote rhythm CSV");
    }
    if let Some(path) = &config.export_summary {
        crate::io::export::write_summary_csv(path, &analysis.summary)?;
        info!(path = %path.display(), "wrote summary CSV");
    }
    if let Some(path) = &config.export_json {
        crate::io::curve::write_rhythm_json(path, analysis)?;
        info!(path = %path.display(), "wrote rhythm JSON");
    }
    if let Some(dir) = &config.svg_dir {
        let files = crate::plot::write_analysis_svgs(dir, analysis, (800, 500))?;
        info!(dir = %dir.display(), files = files.len(), "wrote SVG charts");
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let report = crate::io::curve::read_rhythm_json(&args.json)?;

    println!("{}", crate::report::format_rhythm_table(&report.fits));
    print!(
        "{}",
        crate::plot::render_report_plots(&report, args.width, args.height)
    );
    Ok(())
}

fn handle_regress(args: RegressArgs) -> Result<(), AppError> {
    let fit = pipeline::run_regression(&args.csv, &args.x, &args.y)?;
    println!("{}", crate::report::format_regression(&fit, &args.x, &args.y));
    Ok(())
}

fn handle_anova(args: AnovaArgs) -> Result<(), AppError> {
    let table = pipeline::run_anova(&args.csv, &args.response, &args.factor_a, &args.factor_b)?;
    println!("{}", crate::report::format_anova(&table, &args.response));
    Ok(())
}

fn handle_survival(args: SurvivalArgs) -> Result<(), AppError> {
    let analysis = pipeline::run_survival(&args.csv, &args.time, &args.event, &args.group)?;
    println!("{}", crate::report::format_survival(&analysis));
    Ok(())
}

pub fn rhythm_config_from_args(args: &RhythmArgs) -> RhythmConfig {
    let mut config = RhythmConfig {
        csv_path: args.csv.clone(),
        condition_order: args
            .conditions
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        wrap_before: args.wrap_before,
        default_signal: args.signal.clone(),
        ..RhythmConfig::default()
    };
    apply_output_args(&mut config, &args.output);
    config
}

fn apply_output_args(config: &mut RhythmConfig, output: &OutputArgs) {
    config.max_iterations = output.max_iterations;
    config.show_summary = output.summary;
    config.plot = output.plot;
    config.plot_width = output.width;
    config.plot_height = output.height;
    config.export_csv = output.export.clone();
    config.export_summary = output.export_summary.clone();
    config.export_json = output.export_json.clone();
    config.svg_dir = output.svg_dir.clone();
}
