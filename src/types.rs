//! Core types for the Lapscope pipeline
//!
//! This module defines the rows that flow through each stage: raw table rows as
//! supplied by the session data client, normalized rows on the session-seconds
//! timebase, and the output tables handed to a presentation layer.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BoundaryPolicy;

/// A duration-like field as it appears in a source table.
///
/// Sources emit either plain seconds or a textual rendering
/// (`"0 days 00:01:32.123000"`, `"01:32.123"`, `"PT1M32.123S"`). A JSON `null`
/// deserializes to `None` on the enclosing `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(f64),
    Text(String),
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationValue::Seconds(s) => write!(f, "{s}"),
            DurationValue::Text(t) => f.write_str(t),
        }
    }
}

/// A numeric field that some sources deliver as text (`"3"`, `"DNF"`, `"124"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Number(f64),
    Text(String),
}

impl NumericValue {
    /// Interpret the value as a finite float, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumericValue::Number(n) if n.is_finite() => Some(*n),
            NumericValue::Number(_) => None,
            NumericValue::Text(t) => t.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Number(n) => write!(f, "{n}"),
            NumericValue::Text(t) => f.write_str(t),
        }
    }
}

/// Tyre compound (vendor-agnostic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    #[default]
    Unknown,
}

impl Compound {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
            Compound::Unknown => "UNKNOWN",
        }
    }

    /// Display colour used by compound strategy charts
    pub fn color(&self) -> &'static str {
        match self {
            Compound::Soft => "red",
            Compound::Medium => "yellow",
            Compound::Hard => "black",
            Compound::Intermediate => "green",
            Compound::Wet => "blue",
            Compound::Unknown => "grey",
        }
    }
}

impl From<Option<String>> for Compound {
    fn from(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("SOFT") => Compound::Soft,
            Some(s) if s.eq_ignore_ascii_case("MEDIUM") => Compound::Medium,
            Some(s) if s.eq_ignore_ascii_case("HARD") => Compound::Hard,
            Some(s) if s.eq_ignore_ascii_case("INTERMEDIATE") => Compound::Intermediate,
            Some(s) if s.eq_ignore_ascii_case("WET") => Compound::Wet,
            _ => Compound::Unknown,
        }
    }
}

impl From<Compound> for String {
    fn from(value: Compound) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speed trap readings for one lap (km/h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedTraps {
    /// Sector 1 intermediate
    #[serde(default, alias = "SpeedI1")]
    pub speed_i1: Option<f64>,
    /// Sector 2 intermediate
    #[serde(default, alias = "SpeedI2")]
    pub speed_i2: Option<f64>,
    /// Finish line
    #[serde(default, alias = "SpeedFL")]
    pub speed_fl: Option<f64>,
    /// Longest straight
    #[serde(default, alias = "SpeedST")]
    pub speed_st: Option<f64>,
}

/// Integer columns of dataframe exports arrive as `1.0`; accept any float with
/// no fractional part that fits the target type.
fn to_whole<T: TryFrom<u64>>(value: f64) -> Result<T, String> {
    if value.fract() != 0.0 || value < 0.0 {
        return Err(format!("expected a whole number, got {value}"));
    }
    T::try_from(value as u64).map_err(|_| format!("{value} is out of range"))
}

fn whole_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = f64::deserialize(deserializer)?;
    to_whole(value).map_err(de::Error::custom)
}

fn optional_whole_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(to_whole)
        .transpose()
        .map_err(de::Error::custom)
}

/// One row of the lap table, as supplied by the session data client.
///
/// Uniquely identified by `(driver_id, lap_number)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub driver_id: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    pub driver_number: Option<u32>,
    #[serde(deserialize_with = "whole_number")]
    pub lap_number: u32,
    #[serde(default)]
    pub lap_start_time: Option<DurationValue>,
    #[serde(default)]
    pub lap_time: Option<DurationValue>,
    #[serde(default)]
    pub stint: Option<f64>,
    #[serde(default)]
    pub compound: Compound,
    #[serde(default)]
    pub tyre_life: Option<f64>,
    #[serde(default)]
    pub is_fresh_tyre: Option<bool>,
    #[serde(default)]
    pub track_status: Option<NumericValue>,
    #[serde(flatten)]
    pub speed_traps: SpeedTraps,
    #[serde(default, deserialize_with = "optional_whole_number")]
    pub position: Option<u32>,
}

/// One row of the results table (one per driver per session)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub driver_id: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub grid_position: Option<NumericValue>,
    #[serde(default)]
    pub classified_position: Option<NumericValue>,
}

/// One instantaneous vehicle-state sample from a driver's telemetry stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub driver_id: String,
    pub session_time: DurationValue,
    #[serde(default)]
    pub rpm: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub throttle: f64,
    #[serde(default, alias = "n_gear", deserialize_with = "whole_number")]
    pub gear: u8,
}

/// Lap row on the session-seconds timebase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLap {
    pub driver_id: String,
    pub driver_number: Option<u32>,
    pub lap_number: u32,
    /// Lap start in seconds since session start
    pub lap_start_s: Option<f64>,
    /// Lap time in seconds (absent for laps without a recorded time)
    pub lap_time_s: Option<f64>,
    pub stint: Option<f64>,
    pub compound: Compound,
    pub tyre_life: Option<f64>,
    pub is_fresh_tyre: Option<bool>,
    pub track_status: Option<f64>,
    pub speed_traps: SpeedTraps,
    pub position: Option<u32>,
}

/// Telemetry sample on the session-seconds timebase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSample {
    pub driver_id: String,
    /// Seconds since session start
    pub session_time_s: f64,
    pub rpm: f64,
    pub speed: f64,
    pub throttle: f64,
    pub gear: u8,
}

/// Time interval owned by one lap of one driver.
///
/// `end_time_seconds` is the next present lap's start; the final lap has no
/// upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapWindow {
    pub driver_id: String,
    pub lap_number: u32,
    pub start_time_seconds: f64,
    pub end_time_seconds: Option<f64>,
}

impl LapWindow {
    pub fn is_final(&self) -> bool {
        self.end_time_seconds.is_none()
    }
}

/// Telemetry sample with derived display columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedSample {
    #[serde(flatten)]
    pub sample: NormalizedSample,
    /// Engine speed rescaled for plotting alongside speed and throttle
    pub rpm_display: f64,
}

/// Telemetry restricted to one lap window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedLap {
    pub window: LapWindow,
    /// Session time at which the lap starts, for marking the chart
    pub lap_start_marker: f64,
    pub boundary_policy: BoundaryPolicy,
    pub samples: Vec<SegmentedSample>,
}

impl SegmentedLap {
    /// An empty segment is a legitimate result, not an error
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Results row augmented with the position change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub driver_id: String,
    pub abbreviation: String,
    pub grid_position: i32,
    pub classified_position: i32,
    /// Grid minus classified position; positive means places gained
    pub position_change: i32,
}

impl From<&SummaryRow> for ResultRecord {
    fn from(row: &SummaryRow) -> Self {
        ResultRecord {
            driver_id: row.driver_id.clone(),
            abbreviation: row.abbreviation.clone(),
            grid_position: Some(NumericValue::Number(f64::from(row.grid_position))),
            classified_position: Some(NumericValue::Number(f64::from(row.classified_position))),
        }
    }
}

/// One ranked feature of a lap-time model fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub feature_name: String,
    pub importance_score: f64,
}

/// Label-to-code assignment of one categorical encoding fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedLabel {
    pub label: String,
    pub code: u32,
}

/// Output of one feature importance run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceReport {
    /// Features ranked by descending importance
    pub entries: Vec<ImportanceEntry>,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows excluded because their lap time was absent
    pub dropped_target_rows: usize,
    /// Mean squared error on the held-out split (seconds²)
    pub test_mse: Option<f64>,
    /// Compound codes of this fit; not comparable across fits
    pub compound_encoding: Vec<EncodedLabel>,
}

/// Distinct drivers of a session with the default selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSelection {
    pub drivers: Vec<String>,
    pub default: Option<String>,
}

/// Lap numbers available for one driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapOptions {
    pub driver_id: String,
    pub laps: Vec<u32>,
    /// Lowest available lap number
    pub default: u32,
}

/// A `(lap_number, value)` point of a per-driver series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub lap_number: u32,
    pub value: f64,
}

/// Per-driver series over lap number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSeries {
    pub driver_id: String,
    pub points: Vec<SeriesPoint>,
}

/// Run of consecutive laps on one compound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundStint {
    pub compound: Compound,
    pub color: String,
    pub first_lap: u32,
    pub last_lap: u32,
    pub lap_count: u32,
}
