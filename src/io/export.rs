//! Export rhythm results and observations to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.
//! Missing estimates are written as `NA`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{Observation, RhythmRow, SummaryPoint};
use crate::error::AppError;

/// Write one row per group (rounded values).
pub fn write_rhythm_csv(path: &Path, rows: &[RhythmRow]) -> Result<(), AppError> {
    let mut file = create(path)?;
    write_rhythm_rows(&mut file, rows)
}

pub fn write_rhythm_rows<W: Write>(out: &mut W, rows: &[RhythmRow]) -> Result<(), AppError> {
    writeln!(
        out,
        "signal,condition,amplitude,phase,offset,ci_lower,ci_upper,classification,n_points"
    )
    .map_err(write_err)?;

    for r in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            r.signal,
            r.condition,
            cell(r.amplitude),
            cell(r.phase),
            cell(r.offset),
            cell(r.ci_lower),
            cell(r.ci_upper),
            r.classification.as_str(),
            r.n_points,
        )
        .map_err(write_err)?;
    }
    Ok(())
}

/// Write the per-timepoint summary table.
pub fn write_summary_csv(path: &Path, summary: &[SummaryPoint]) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "signal,condition,timepoint,mean,sd,se,n").map_err(write_err)?;
    for p in summary {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            p.signal,
            p.condition,
            p.timepoint,
            cell(p.mean),
            cell(p.sd),
            cell(p.se),
            p.n,
        )
        .map_err(write_err)?;
    }
    Ok(())
}

/// Write raw observations in the same layout `rhythm --csv` reads.
pub fn write_observations_csv(path: &Path, observations: &[Observation]) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "signal,condition,timepoint,value").map_err(write_err)?;
    for o in observations {
        writeln!(
            file,
            "{},{},{},{}",
            o.signal,
            o.condition,
            o.timepoint,
            if o.value.is_finite() {
                format!("{:.6}", o.value)
            } else {
                "NA".to_string()
            },
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_err(e: std::io::Error) -> AppError {
    AppError::input(format!("Failed to write export CSV: {e}"))
}

fn cell(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { "NA".to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Classification;

    #[test]
    fn rhythm_rows_write_na_for_missing_estimates() {
        let rows = vec![
            RhythmRow {
                signal: "per1".to_string(),
                condition: "blue".to_string(),
                amplitude: 1.2346,
                phase: 13.5,
                offset: 4.0,
                ci_lower: 0.5,
                ci_upper: 1.9692,
                classification: Classification::Rhythmic,
                n_points: 6,
            },
            RhythmRow {
                signal: "per1".to_string(),
                condition: "red".to_string(),
                amplitude: f64::NAN,
                phase: f64::NAN,
                offset: f64::NAN,
                ci_lower: f64::NAN,
                ci_upper: f64::NAN,
                classification: Classification::InsufficientData,
                n_points: 2,
            },
        ];

        let mut buf = Vec::new();
        write_rhythm_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "per1,blue,1.2346,13.5,4,0.5,1.9692,rhythmic,6");
        assert_eq!(lines[2], "per1,red,NA,NA,NA,NA,NA,insufficient_data,2");
    }
}
