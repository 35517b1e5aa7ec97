//! Command-line parsing for the wavelength pilot report.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "toadlight",
    version,
    about = "Light-wavelength pilot study: circadian rhythm fits and classical tests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a 24 h cosine to every (signal, condition) group of an expression CSV.
    Rhythm(RhythmArgs),
    /// Run the rhythm pipeline on seeded synthetic clock-gene data.
    Demo(DemoArgs),
    /// Plot the fitted curves of a previously exported report JSON.
    Plot(PlotArgs),
    /// Simple linear regression of one numeric column on another.
    Regress(RegressArgs),
    /// Two-way ANOVA with interaction.
    Anova(AnovaArgs),
    /// Kaplan-Meier curves and log-rank test.
    Survival(SurvivalArgs),
}

/// Output options shared by `rhythm` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Print the per-timepoint summary (mean, SE, n).
    #[arg(long)]
    pub summary: bool,

    /// Render an ASCII plot per group.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Export per-group fits to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the per-timepoint summary to CSV.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Export fits plus fitted curve grids to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Write one SVG chart per group into this directory.
    #[arg(long = "svg-dir")]
    pub svg_dir: Option<PathBuf>,

    /// Solver iteration cap per group.
    #[arg(long, default_value_t = 100)]
    pub max_iterations: usize,
}

#[derive(Debug, Args, Clone)]
pub struct RhythmArgs {
    /// Long-format CSV: signal, condition, timepoint, value.
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Reporting order of conditions (comma-separated); others follow as seen.
    #[arg(long, value_delimiter = ',')]
    pub conditions: Vec<String>,

    /// Shift timepoints below this hour by +24 (e.g. 4 puts ZT1 after ZT21).
    #[arg(long = "wrap-before", value_name = "HOUR")]
    pub wrap_before: Option<f64>,

    /// Signal id to use when the CSV has no signal column.
    #[arg(long, default_value = "value")]
    pub signal: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Random seed for the synthetic data.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Replicates per timepoint.
    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// Replicate noise SD.
    #[arg(long, default_value_t = 0.35)]
    pub noise: f64,

    /// Also write the generated observations to CSV.
    #[arg(long = "export-data", value_name = "CSV")]
    pub export_data: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for plotting a saved report.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Report JSON produced by `toadlight rhythm --export-json`.
    #[arg(long, value_name = "JSON")]
    pub json: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

#[derive(Debug, Args)]
pub struct RegressArgs {
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Predictor column.
    #[arg(long)]
    pub x: String,

    /// Response column.
    #[arg(long)]
    pub y: String,
}

#[derive(Debug, Args)]
pub struct AnovaArgs {
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Numeric response column.
    #[arg(long)]
    pub response: String,

    /// First factor (entered first in the sequential sums of squares).
    #[arg(long = "factor-a")]
    pub factor_a: String,

    /// Second factor.
    #[arg(long = "factor-b")]
    pub factor_b: String,
}

#[derive(Debug, Args)]
pub struct SurvivalArgs {
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Time-to-event column.
    #[arg(long)]
    pub time: String,

    /// Event indicator column (1/0, dead/alive, ...).
    #[arg(long)]
    pub event: String,

    /// Grouping column (e.g. wavelength).
    #[arg(long)]
    pub group: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rhythm_flags_parse() {
        let cli = Cli::try_parse_from([
            "toadlight",
            "rhythm",
            "--csv",
            "genes.csv",
            "--conditions",
            "white,blue,red",
            "--wrap-before",
            "4",
            "--plot",
        ])
        .unwrap();
        let Command::Rhythm(args) = cli.command else {
            panic!("expected rhythm");
        };
        assert_eq!(args.conditions, vec!["white", "blue", "red"]);
        assert_eq!(args.wrap_before, Some(4.0));
        assert!(args.output.plot);
        assert_eq!(args.output.max_iterations, 100);
        assert_eq!(args.signal, "value");
    }

    #[test]
    fn survival_requires_columns() {
        assert!(Cli::try_parse_from(["toadlight", "survival", "--csv", "s.csv"]).is_err());
    }
}
