//! CSV ingest and normalization.
//!
//! This module is responsible for turning the study's measurement sheets into
//! clean in-memory rows:
//!
//! - rhythm sheets become [`Observation`]s (signal, condition, timepoint, value)
//! - every other sheet becomes a generic [`Table`] that the statistics
//!   pipelines read by column name
//!
//! Design goals:
//! - **Header aliases** (`gene`/`signal`, `zt`/`timepoint`, `wavelength`/`condition`)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Missing values are data**: an empty or non-numeric `value` is kept as NaN
//!   so it still shows up in the replicate count bookkeeping
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::domain::{Observation, RhythmConfig};
use crate::error::AppError;

const SIGNAL_COLUMNS: [&str; 3] = ["signal", "gene", "target"];
const CONDITION_COLUMNS: [&str; 3] = ["condition", "wavelength", "treatment"];
const TIMEPOINT_COLUMNS: [&str; 3] = ["timepoint", "zt", "time"];
const VALUE_COLUMNS: [&str; 1] = ["value"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: observations + row bookkeeping.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Rows whose `value` was empty or unparseable (kept as NaN).
    pub missing_values: usize,
}

impl IngestedData {
    /// Wrap observations that did not come from a file (demo data).
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let missing_values = observations.iter().filter(|o| o.value.is_nan()).count();
        Self {
            rows_read: observations.len(),
            observations,
            row_errors: Vec::new(),
            missing_values,
        }
    }
}

/// Load rhythm observations from the CSV named in `config`.
pub fn load_observations(config: &RhythmConfig) -> Result<IngestedData, AppError> {
    let file = File::open(&config.csv_path).map_err(|e| {
        AppError::input(format!(
            "Failed to open CSV '{}': {e}",
            config.csv_path.display()
        ))
    })?;
    let data = read_observations(file, config)?;

    info!(
        path = %config.csv_path.display(),
        rows = data.rows_read,
        observations = data.observations.len(),
        missing = data.missing_values,
        skipped = data.row_errors.len(),
        "loaded observations"
    );
    for err in &data.row_errors {
        warn!(line = err.line, "{}", err.message);
    }
    Ok(data)
}

/// Parse rhythm observations from any reader.
pub fn read_observations<R: Read>(reader: R, config: &RhythmConfig) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let value_idx = find_column(&header_map, &VALUE_COLUMNS)
        .ok_or_else(|| AppError::input("Missing required column: `value`"))?;
    let time_idx = find_column(&header_map, &TIMEPOINT_COLUMNS).ok_or_else(|| {
        AppError::input("Missing required timepoint column (`timepoint`, `zt` or `time`).")
    })?;
    let condition_idx = find_column(&header_map, &CONDITION_COLUMNS).ok_or_else(|| {
        AppError::input(
            "Missing required condition column (`condition`, `wavelength` or `treatment`).",
        )
    })?;
    let signal_idx = find_column(&header_map, &SIGNAL_COLUMNS);
    if signal_idx.is_none() {
        debug!(signal = %config.default_signal, "no signal column; using default signal");
    }

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut missing_values = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header line, then 1-based numbering.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let timepoint = match get_cell(&record, Some(time_idx)).map(str::parse::<f64>) {
            Some(Ok(t)) if t.is_finite() => wrap_timepoint(t, config.wrap_before),
            _ => {
                row_errors.push(RowError {
                    line,
                    message: "Missing/invalid timepoint.".to_string(),
                });
                continue;
            }
        };

        let Some(condition) = get_cell(&record, Some(condition_idx)) else {
            row_errors.push(RowError {
                line,
                message: "Missing condition label.".to_string(),
            });
            continue;
        };

        let signal = match signal_idx {
            Some(_) => match get_cell(&record, signal_idx) {
                Some(s) => s.to_string(),
                None => {
                    row_errors.push(RowError {
                        line,
                        message: "Missing signal identifier.".to_string(),
                    });
                    continue;
                }
            },
            None => config.default_signal.clone(),
        };

        let value = match parse_opt_f64(get_cell(&record, Some(value_idx))) {
            Some(v) => v,
            None => {
                missing_values += 1;
                f64::NAN
            }
        };

        observations.push(Observation {
            signal,
            condition: condition.to_string(),
            timepoint,
            value,
        });
    }

    if observations.is_empty() {
        return Err(AppError::insufficient("No valid rows remain after ingest."));
    }

    Ok(IngestedData {
        observations,
        row_errors,
        rows_read,
        missing_values,
    })
}

/// Shift early timepoints by one period so a curve stays continuous across
/// the wrap point (e.g. `wrap_before = 12` maps ZT 2 to ZT 26).
pub fn wrap_timepoint(t: f64, wrap_before: Option<f64>) -> f64 {
    match wrap_before {
        Some(cut) if t < cut => t + crate::domain::PERIOD_HOURS,
        _ => t,
    }
}

/// A generic CSV sheet: normalized headers and trimmed string cells.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    header_map: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), rows = table.len(), "loaded table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let raw = reader
            .headers()
            .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
            .clone();
        let header_map = build_header_map(&raw);
        let headers = raw.iter().map(normalize_header_name).collect();

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::input(format!("CSV parse error: {e}")))?;

        Ok(Self {
            headers,
            header_map,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn column(&self, name: &str) -> Result<usize, AppError> {
        self.header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| {
                AppError::input(format!(
                    "Missing column `{name}` (have: {}).",
                    self.headers.join(", ")
                ))
            })
    }

    /// Cells of a text column; empty cells are `None`.
    pub fn text_column(&self, name: &str) -> Result<Vec<Option<String>>, AppError> {
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|r| get_cell(r, Some(idx)).map(str::to_string))
            .collect())
    }

    /// Cells of a numeric column; empty or unparseable cells are `None`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, AppError> {
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|r| parse_opt_f64(get_cell(r, Some(idx))))
            .collect())
    }

    /// Cells of an event-indicator column (`1/0`, `true/false`, `yes/no`,
    /// `dead/alive`).
    pub fn flag_column(&self, name: &str) -> Result<Vec<Option<bool>>, AppError> {
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|r| get_cell(r, Some(idx)).and_then(parse_flag))
            .collect())
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| header_map.get(*a).copied())
}

fn get_cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    record.get(idx?).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    if s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return None;
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "dead" | "died" | "event" => Some(true),
        "0" | "false" | "no" | "n" | "alive" | "censored" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RhythmConfig {
        RhythmConfig {
            default_signal: "cort".to_string(),
            ..RhythmConfig::default()
        }
    }

    #[test]
    fn aliases_and_missing_values() {
        let csv = "\u{feff}Gene,Wavelength,ZT,Value\n\
                   per2,blue,0,1.5\n\
                   per2,blue,0,\n\
                   per2,blue,6,NA\n\
                   per2,red,x,3.0\n";
        let data = read_observations(csv.as_bytes(), &config()).unwrap();

        assert_eq!(data.rows_read, 4);
        assert_eq!(data.observations.len(), 3);
        assert_eq!(data.missing_values, 2);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 5);

        let first = &data.observations[0];
        assert_eq!(first.signal, "per2");
        assert_eq!(first.condition, "blue");
        assert_eq!(first.value, 1.5);
        assert!(data.observations[1].value.is_nan());
    }

    #[test]
    fn default_signal_and_wrapping() {
        let csv = "condition,timepoint,value\nwhite,2,10\nwhite,14,12\n";
        let cfg = RhythmConfig {
            wrap_before: Some(12.0),
            ..config()
        };
        let data = read_observations(csv.as_bytes(), &cfg).unwrap();

        assert_eq!(data.observations[0].signal, "cort");
        assert_eq!(data.observations[0].timepoint, 26.0);
        assert_eq!(data.observations[1].timepoint, 14.0);
    }

    #[test]
    fn missing_required_column_is_an_input_error() {
        let csv = "gene,zt,value\nper2,0,1\n";
        let err = read_observations(csv.as_bytes(), &config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn table_columns_by_name() {
        let csv = "Group,Days,Died\nred,10,1\nblue,,0\nblue,7,maybe\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.numeric_column("days").unwrap(),
            vec![Some(10.0), None, Some(7.0)]
        );
        assert_eq!(
            table.flag_column("DIED").unwrap(),
            vec![Some(true), Some(false), None]
        );
        assert!(table.text_column("sex").is_err());
    }
}
