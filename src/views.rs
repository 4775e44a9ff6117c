//! Per-session views
//!
//! Small projections of the lap table that a race dashboard needs next to the
//! core analyses: which drivers and laps can be selected, how positions and lap
//! times evolve, and which compounds each driver ran.

use crate::config::SelectionPolicy;
use crate::error::AnalysisError;
use crate::types::{
    CompoundStint, DriverSelection, DriverSeries, LapOptions, NormalizedLap, SeriesPoint,
};

/// Distinct drivers of the session; `default` follows `policy`
pub fn driver_list(laps: &[NormalizedLap], policy: SelectionPolicy) -> DriverSelection {
    let mut drivers: Vec<String> = Vec::new();
    for lap in laps {
        if !drivers.contains(&lap.driver_id) {
            drivers.push(lap.driver_id.clone());
        }
    }

    let default = match policy {
        SelectionPolicy::FirstInSourceOrder => drivers.first().cloned(),
        SelectionPolicy::Lexicographic => drivers.iter().min().cloned(),
    };

    DriverSelection { drivers, default }
}

/// Lap numbers recorded for a driver, ascending; the lowest is the default
pub fn lap_options(laps: &[NormalizedLap], driver_id: &str) -> Result<LapOptions, AnalysisError> {
    let mut numbers: Vec<u32> = laps
        .iter()
        .filter(|l| l.driver_id == driver_id)
        .map(|l| l.lap_number)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();

    let default = *numbers
        .first()
        .ok_or_else(|| AnalysisError::DriverNotFound(driver_id.to_string()))?;

    Ok(LapOptions {
        driver_id: driver_id.to_string(),
        laps: numbers,
        default,
    })
}

/// Running position per lap for every driver
pub fn position_evolution(laps: &[NormalizedLap]) -> Vec<DriverSeries> {
    series_by_driver(laps, |lap| lap.position.map(f64::from))
}

/// Lap time in seconds per lap for every driver; laps without a time are skipped
pub fn lap_time_series(laps: &[NormalizedLap]) -> Vec<DriverSeries> {
    series_by_driver(laps, |lap| lap.lap_time_s)
}

fn series_by_driver<F>(laps: &[NormalizedLap], value: F) -> Vec<DriverSeries>
where
    F: Fn(&NormalizedLap) -> Option<f64>,
{
    let selection = driver_list(laps, SelectionPolicy::FirstInSourceOrder);
    selection
        .drivers
        .into_iter()
        .map(|driver_id| {
            let mut points: Vec<SeriesPoint> = laps
                .iter()
                .filter(|l| l.driver_id == driver_id)
                .filter_map(|l| {
                    value(l).map(|v| SeriesPoint {
                        lap_number: l.lap_number,
                        value: v,
                    })
                })
                .collect();
            points.sort_by_key(|p| p.lap_number);
            DriverSeries { driver_id, points }
        })
        .collect()
}

/// Runs of consecutive laps on the same compound and stint for one driver
pub fn compound_stints(
    laps: &[NormalizedLap],
    driver_id: &str,
) -> Result<Vec<CompoundStint>, AnalysisError> {
    let mut driver_laps: Vec<&NormalizedLap> =
        laps.iter().filter(|l| l.driver_id == driver_id).collect();
    if driver_laps.is_empty() {
        return Err(AnalysisError::DriverNotFound(driver_id.to_string()));
    }
    driver_laps.sort_by_key(|l| l.lap_number);

    let mut stints: Vec<CompoundStint> = Vec::new();
    let mut current_stint = driver_laps[0].stint;

    for lap in driver_laps {
        match stints.last_mut() {
            Some(last) if last.compound == lap.compound && current_stint == lap.stint => {
                last.last_lap = lap.lap_number;
                last.lap_count += 1;
            }
            _ => {
                current_stint = lap.stint;
                stints.push(CompoundStint {
                    compound: lap.compound,
                    color: lap.compound.color().to_string(),
                    first_lap: lap.lap_number,
                    last_lap: lap.lap_number,
                    lap_count: 1,
                });
            }
        }
    }

    Ok(stints)
}
