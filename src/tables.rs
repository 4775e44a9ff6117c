//! Table ingestion
//!
//! Session tables arrive as a JSON array of row objects or as NDJSON, one row
//! per line. [`TableReader`] parses either into typed rows; the `validate_*`
//! functions report per-row problems without running an analysis.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::summary::coerce_position;
use crate::timebase::Normalizer;
use crate::types::{LapRecord, ResultRecord, TelemetrySample};

/// Serialized layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// A single JSON array of row objects
    #[default]
    Json,
    /// One JSON row object per line
    Ndjson,
}

impl FromStr for TableFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(TableFormat::Json),
            "ndjson" | "jsonl" => Ok(TableFormat::Ndjson),
            other => Err(AnalysisError::MalformedInput(format!(
                "unknown table format '{other}'"
            ))),
        }
    }
}

/// Reader for session tables
pub struct TableReader;

impl TableReader {
    pub fn parse<T: DeserializeOwned>(
        input: &str,
        format: TableFormat,
    ) -> Result<Vec<T>, AnalysisError> {
        match format {
            TableFormat::Json => Self::parse_array(input),
            TableFormat::Ndjson => Self::parse_ndjson(input),
        }
    }

    /// Parse a JSON string containing an array of rows
    pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, AnalysisError> {
        let rows: Vec<T> = serde_json::from_str(json)?;
        Ok(rows)
    }

    /// Parse NDJSON (newline-delimited JSON), skipping blank lines
    pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, AnalysisError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(AnalysisError::MalformedInput(format!(
                        "failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(rows)
    }
}

/// A problem found in one row of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Zero-based row index in source order
    pub row: usize,
    pub driver_id: String,
    pub problem: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ({}): {}", self.row, self.driver_id, self.problem)
    }
}

/// Outcome of validating one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, row: usize, driver_id: &str, problem: impl Into<String>) {
        self.issues.push(ValidationIssue {
            row,
            driver_id: driver_id.to_string(),
            problem: problem.into(),
        });
    }
}

/// Check a lap table: unique `(driver_id, lap_number)`, parseable durations,
/// and a start time on every lap.
pub fn validate_laps(laps: &[LapRecord]) -> ValidationReport {
    let mut report = ValidationReport {
        rows_checked: laps.len(),
        ..Default::default()
    };
    let mut seen: HashSet<(&str, u32)> = HashSet::new();

    for (row, lap) in laps.iter().enumerate() {
        if !seen.insert((lap.driver_id.as_str(), lap.lap_number)) {
            report.push(row, &lap.driver_id, format!("duplicate lap {}", lap.lap_number));
        }
        match Normalizer::normalize_laps(std::slice::from_ref(lap)) {
            Ok(normalized) => {
                if normalized.first().is_some_and(|n| n.lap_start_s.is_none()) {
                    report.push(
                        row,
                        &lap.driver_id,
                        format!("lap {} has no start time", lap.lap_number),
                    );
                }
            }
            Err(e) => report.push(row, &lap.driver_id, e.to_string()),
        }
    }

    report
}

/// Check a results table: unique drivers, and positions that will need the
/// zero fallback when summarized.
pub fn validate_results(results: &[ResultRecord]) -> ValidationReport {
    let mut report = ValidationReport {
        rows_checked: results.len(),
        ..Default::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();

    for (row, result) in results.iter().enumerate() {
        if !seen.insert(result.driver_id.as_str()) {
            report.push(row, &result.driver_id, "duplicate driver");
        }
        for (field, value) in [
            ("grid_position", &result.grid_position),
            ("classified_position", &result.classified_position),
        ] {
            if coerce_position(value.as_ref()).is_none() {
                report.push(
                    row,
                    &result.driver_id,
                    format!("{field} is not numeric and will be treated as 0"),
                );
            }
        }
    }

    report
}

/// Check a telemetry stream: parseable session times, non-decreasing per driver.
pub fn validate_telemetry(samples: &[TelemetrySample]) -> ValidationReport {
    let mut report = ValidationReport {
        rows_checked: samples.len(),
        ..Default::default()
    };
    let mut last_time: HashMap<&str, f64> = HashMap::new();

    for (row, sample) in samples.iter().enumerate() {
        let time = match Normalizer::normalize_telemetry(std::slice::from_ref(sample)) {
            Ok(normalized) => match normalized.first() {
                Some(n) => n.session_time_s,
                None => continue,
            },
            Err(e) => {
                report.push(row, &sample.driver_id, e.to_string());
                continue;
            }
        };

        if let Some(&previous) = last_time.get(sample.driver_id.as_str()) {
            if time < previous {
                report.push(
                    row,
                    &sample.driver_id,
                    format!("session time {time}s goes back from {previous}s"),
                );
            }
        }
        last_time.insert(sample.driver_id.as_str(), time);
    }

    report
}
