//! Timebase normalization
//!
//! This module puts every duration-like field on one linear scale: seconds since
//! session start. Lap-table and telemetry timestamps are only comparable after
//! both have passed through here.
//! - Plain seconds, pandas timedeltas, clock notation and ISO-8601 are accepted
//! - Missing markers (`NaT`, `NaN`, empty) become `None`
//! - Anything else is an error, never a silent default

use chrono::TimeDelta;

use crate::error::AnalysisError;
use crate::types::{
    DurationValue, LapRecord, NormalizedLap, NormalizedSample, NumericValue, TelemetrySample,
};

const MISSING_MARKERS: [&str; 6] = ["", "nat", "nan", "none", "null", "na"];

/// Normalizer for converting source tables onto the session-seconds timebase
pub struct Normalizer;

impl Normalizer {
    /// Normalize a lap table, preserving row order
    pub fn normalize_laps(laps: &[LapRecord]) -> Result<Vec<NormalizedLap>, AnalysisError> {
        laps.iter().map(normalize_lap).collect()
    }

    /// Normalize a telemetry stream, preserving row order
    pub fn normalize_telemetry(
        samples: &[TelemetrySample],
    ) -> Result<Vec<NormalizedSample>, AnalysisError> {
        samples
            .iter()
            .map(|s| {
                let session_time_s = duration_to_seconds(&s.session_time, "session_time")?
                    .ok_or_else(|| {
                        AnalysisError::MissingField(format!(
                            "session_time for driver {}",
                            s.driver_id
                        ))
                    })?;
                Ok(NormalizedSample {
                    driver_id: s.driver_id.clone(),
                    session_time_s,
                    rpm: s.rpm,
                    speed: s.speed,
                    throttle: s.throttle,
                    gear: s.gear,
                })
            })
            .collect()
    }
}

fn normalize_lap(lap: &LapRecord) -> Result<NormalizedLap, AnalysisError> {
    let lap_start_s = lap
        .lap_start_time
        .as_ref()
        .map(|v| duration_to_seconds(v, "lap_start_time"))
        .transpose()?
        .flatten();
    let lap_time_s = lap
        .lap_time
        .as_ref()
        .map(|v| duration_to_seconds(v, "lap_time"))
        .transpose()?
        .flatten();
    let track_status = lap
        .track_status
        .as_ref()
        .map(|v| parse_track_status(v, lap))
        .transpose()?
        .flatten();

    Ok(NormalizedLap {
        driver_id: lap.driver_id.clone(),
        driver_number: lap.driver_number,
        lap_number: lap.lap_number,
        lap_start_s,
        lap_time_s,
        stint: lap.stint,
        compound: lap.compound,
        tyre_life: lap.tyre_life,
        is_fresh_tyre: lap.is_fresh_tyre,
        track_status,
        speed_traps: lap.speed_traps,
        position: lap.position,
    })
}

/// Track status codes are digit strings ("1", "124"); missing markers are `None`
fn parse_track_status(
    value: &NumericValue,
    lap: &LapRecord,
) -> Result<Option<f64>, AnalysisError> {
    match value {
        NumericValue::Number(n) if n.is_nan() => Ok(None),
        NumericValue::Text(t) if is_missing_marker(t) => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| {
            AnalysisError::MalformedInput(format!(
                "track_status {:?} on lap {} of driver {} is not numeric",
                other.to_string(),
                lap.lap_number,
                lap.driver_id
            ))
        }),
    }
}

fn is_missing_marker(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    MISSING_MARKERS.contains(&lowered.as_str())
}

/// Convert a duration-like value into seconds.
///
/// Returns `Ok(None)` for an explicit missing marker and an error for any
/// value that is present but cannot be read.
pub fn duration_to_seconds(
    value: &DurationValue,
    field: &'static str,
) -> Result<Option<f64>, AnalysisError> {
    let malformed = || AnalysisError::MalformedDuration {
        field,
        value: value.to_string(),
    };

    match value {
        DurationValue::Seconds(s) if s.is_nan() => Ok(None),
        DurationValue::Seconds(s) if s.is_finite() => Ok(Some(*s)),
        DurationValue::Seconds(_) => Err(malformed()),
        DurationValue::Text(text) => {
            if is_missing_marker(text) {
                return Ok(None);
            }
            parse_duration_text(text.trim()).map(Some).ok_or_else(malformed)
        }
    }
}

fn parse_duration_text(text: &str) -> Option<f64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };

    let seconds = if let Some(iso) = body.strip_prefix('P') {
        parse_iso8601(iso)?
    } else if let Some((days, clock)) = split_days(body) {
        days * 86_400.0 + parse_clock(clock)?
    } else if body.contains(':') {
        parse_clock(body)?
    } else {
        parse_plain_seconds(body)?
    };

    Some(if negative { -seconds } else { seconds })
}

/// `"0 days 00:01:32.123000"` or `"1 day 00:00:01"`
fn split_days(text: &str) -> Option<(f64, &str)> {
    let (days, rest) = text.split_once(' ')?;
    let rest = rest.trim_start();
    let clock = rest
        .strip_prefix("days")
        .or_else(|| rest.strip_prefix("day"))?
        .trim_start();
    let days = days.parse::<u32>().ok()?;
    Some((f64::from(days), clock))
}

/// `HH:MM:SS(.fff)` or `MM:SS(.fff)`
fn parse_clock(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?, *s),
        [m, s] => (0, m.parse::<u32>().ok()?, *s),
        _ => return None,
    };
    let seconds = parse_plain_seconds(seconds)?;
    if minutes >= 60 || seconds >= 60.0 {
        return None;
    }
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

/// ISO-8601 duration body after the leading `P`, e.g. `T1M32.123S` or `0DT1H2M3S`
fn parse_iso8601(text: &str) -> Option<f64> {
    let (date_part, time_part) = match text.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };

    let mut total = 0.0;
    let mut seen = false;

    if !date_part.is_empty() {
        let days = date_part.strip_suffix('D')?;
        total += parse_plain_seconds(days)? * 86_400.0;
        seen = true;
    }

    if let Some(time) = time_part {
        let mut number = String::new();
        for ch in time.chars() {
            match ch {
                'H' | 'M' | 'S' => {
                    let value = parse_plain_seconds(&number)?;
                    total += match ch {
                        'H' => value * 3600.0,
                        'M' => value * 60.0,
                        _ => value,
                    };
                    number.clear();
                    seen = true;
                }
                _ => number.push(ch),
            }
        }
        if !number.is_empty() {
            return None;
        }
    }

    seen.then_some(total)
}

fn parse_plain_seconds(text: &str) -> Option<f64> {
    if text.is_empty() || text.starts_with(['+', '-']) {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Inverse of [`duration_to_seconds`]: seconds back to a duration, to the microsecond
pub fn seconds_to_timedelta(seconds: f64) -> Result<TimeDelta, AnalysisError> {
    // i64 microseconds covers roughly ±292k years; anything beyond is not a session time
    if !seconds.is_finite() || seconds.abs() > 1e12 {
        return Err(AnalysisError::MalformedDuration {
            field: "seconds",
            value: seconds.to_string(),
        });
    }
    Ok(TimeDelta::microseconds((seconds * 1e6).round() as i64))
}

/// Render a duration the way pandas prints timedeltas: `"0 days 00:01:32.123000"`
pub fn format_timedelta(delta: TimeDelta) -> String {
    let sign = if delta < TimeDelta::zero() { "-" } else { "" };
    let delta = delta.abs();
    let total_micros = delta.num_microseconds().unwrap_or(i64::MAX);
    let micros = total_micros % 1_000_000;
    let total_secs = total_micros / 1_000_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{sign}{days} days {hours:02}:{minutes:02}:{secs:02}.{micros:06}")
}
