//! Lap window indexing
//!
//! A driver's lap `n` owns the time interval from its own start to the start of
//! the next lap present in the table. Laps missing from the table (a retirement,
//! a dropped row) get no window, and the lap before the gap runs until the next
//! present lap starts. The final lap has no upper bound from the lap table alone.

use std::collections::BTreeMap;

use crate::error::AnalysisError;
use crate::types::{LapWindow, NormalizedLap};

/// Indexer for computing lap windows from lap start times
pub struct LapWindowIndexer;

impl LapWindowIndexer {
    /// Compute the windows of one driver's laps, ordered by lap number.
    ///
    /// Rows belonging to other drivers are ignored.
    pub fn index_driver(
        laps: &[NormalizedLap],
        driver_id: &str,
    ) -> Result<Vec<LapWindow>, AnalysisError> {
        let mut starts: Vec<(u32, f64)> = Vec::new();
        for lap in laps.iter().filter(|l| l.driver_id == driver_id) {
            let start = lap.lap_start_s.ok_or_else(|| {
                AnalysisError::MissingField(format!(
                    "lap_start_time for lap {} of driver {}",
                    lap.lap_number, driver_id
                ))
            })?;
            starts.push((lap.lap_number, start));
        }

        if starts.is_empty() {
            return Err(AnalysisError::DriverNotFound(driver_id.to_string()));
        }

        starts.sort_by_key(|(lap_number, _)| *lap_number);

        if let Some(pair) = starts.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(AnalysisError::MalformedInput(format!(
                "lap {} appears more than once for driver {}",
                pair[0].0, driver_id
            )));
        }

        if let Some(pair) = starts.windows(2).find(|pair| pair[1].1 < pair[0].1) {
            return Err(AnalysisError::MalformedInput(format!(
                "lap {} of driver {} starts before lap {}",
                pair[1].0, driver_id, pair[0].0
            )));
        }

        let windows = starts
            .iter()
            .enumerate()
            .map(|(i, &(lap_number, start))| LapWindow {
                driver_id: driver_id.to_string(),
                lap_number,
                start_time_seconds: start,
                end_time_seconds: starts.get(i + 1).map(|&(_, next_start)| next_start),
            })
            .collect::<Vec<_>>();

        tracing::debug!(driver = driver_id, windows = windows.len(), "indexed lap windows");

        Ok(windows)
    }

    /// Compute the windows of every driver in the table
    pub fn index_session(
        laps: &[NormalizedLap],
    ) -> Result<BTreeMap<String, Vec<LapWindow>>, AnalysisError> {
        let mut by_driver = BTreeMap::new();
        for lap in laps {
            if !by_driver.contains_key(&lap.driver_id) {
                let windows = Self::index_driver(laps, &lap.driver_id)?;
                by_driver.insert(lap.driver_id.clone(), windows);
            }
        }
        Ok(by_driver)
    }

    /// Look up one lap's window
    pub fn window_for<'a>(
        windows: &'a [LapWindow],
        lap_number: u32,
    ) -> Result<&'a LapWindow, AnalysisError> {
        windows
            .binary_search_by_key(&lap_number, |w| w.lap_number)
            .map(|idx| &windows[idx])
            .map_err(|_| AnalysisError::LapNotFound {
                driver_id: windows
                    .first()
                    .map(|w| w.driver_id.clone())
                    .unwrap_or_default(),
                lap_number,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Compound, SpeedTraps};

    fn make_lap(driver: &str, lap_number: u32, start: Option<f64>) -> NormalizedLap {
        NormalizedLap {
            driver_id: driver.to_string(),
            driver_number: None,
            lap_number,
            lap_start_s: start,
            lap_time_s: Some(90.0),
            stint: Some(1.0),
            compound: Compound::Medium,
            tyre_life: Some(f64::from(lap_number)),
            is_fresh_tyre: Some(false),
            track_status: Some(1.0),
            speed_traps: SpeedTraps::default(),
            position: Some(1),
        }
    }

    #[test]
    fn test_windows_tile_lap_starts() {
        let laps: Vec<_> = (1..=5)
            .map(|n| make_lap("ALO", n, Some(3600.0 + 90.0 * f64::from(n - 1))))
            .collect();
        let windows = LapWindowIndexer::index_driver(&laps, "ALO").unwrap();

        assert_eq!(windows.len(), 5);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_time_seconds, Some(pair[1].start_time_seconds));
        }
        assert!(windows[4].is_final());
        assert_eq!(windows[0].start_time_seconds, 3600.0);
    }

    #[test]
    fn test_gap_is_preserved() {
        let laps = vec![
            make_lap("SAI", 1, Some(100.0)),
            make_lap("SAI", 2, Some(190.0)),
            make_lap("SAI", 4, Some(370.0)),
            make_lap("SAI", 5, Some(460.0)),
        ];
        let windows = LapWindowIndexer::index_driver(&laps, "SAI").unwrap();

        let numbers: Vec<u32> = windows.iter().map(|w| w.lap_number).collect();
        assert_eq!(numbers, vec![1, 2, 4, 5]);
        assert_eq!(windows[1].end_time_seconds, Some(370.0));
        assert!(LapWindowIndexer::window_for(&windows, 3).is_err());
    }

    #[test]
    fn test_unordered_input_is_sorted() {
        let laps = vec![
            make_lap("NOR", 2, Some(190.0)),
            make_lap("NOR", 1, Some(100.0)),
            make_lap("PIA", 1, Some(101.0)),
        ];
        let windows = LapWindowIndexer::index_driver(&laps, "NOR").unwrap();
        assert_eq!(windows[0].lap_number, 1);
        assert_eq!(windows[0].end_time_seconds, Some(190.0));
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_window_for_not_found() {
        let laps = vec![make_lap("RUS", 1, Some(100.0))];
        let windows = LapWindowIndexer::index_driver(&laps, "RUS").unwrap();

        let err = LapWindowIndexer::window_for(&windows, 9).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::LapNotFound { lap_number: 9, .. }
        ));
        assert_eq!(LapWindowIndexer::window_for(&windows, 1).unwrap().lap_number, 1);
    }

    #[test]
    fn test_unknown_driver() {
        let laps = vec![make_lap("RUS", 1, Some(100.0))];
        let result = LapWindowIndexer::index_driver(&laps, "HAM");
        assert!(matches!(result, Err(AnalysisError::DriverNotFound(_))));
    }

    #[test]
    fn test_duplicate_lap_rejected() {
        let laps = vec![make_lap("GAS", 1, Some(100.0)), make_lap("GAS", 1, Some(101.0))];
        let result = LapWindowIndexer::index_driver(&laps, "GAS");
        assert!(matches!(result, Err(AnalysisError::MalformedInput(_))));
    }

    #[test]
    fn test_missing_start_time() {
        let laps = vec![make_lap("OCO", 1, Some(100.0)), make_lap("OCO", 2, None)];
        let result = LapWindowIndexer::index_driver(&laps, "OCO");
        assert!(matches!(result, Err(AnalysisError::MissingField(_))));
    }

    #[test]
    fn test_index_session() {
        let laps = vec![
            make_lap("A", 1, Some(0.0)),
            make_lap("B", 1, Some(1.0)),
            make_lap("A", 2, Some(90.0)),
        ];
        let all = LapWindowIndexer::index_session(&laps).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["A"].len(), 2);
        assert_eq!(all["B"].len(), 1);
    }
}
