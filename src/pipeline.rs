//! Pipeline orchestration
//!
//! This module provides the public API for Lapscope. [`SessionAnalyzer`] holds
//! one loaded session and answers every analysis over it; the free functions
//! run a single analysis from JSON tables to an encoded JSON report.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::encoder::{ReportEncoder, ReportKind};
use crate::error::AnalysisError;
use crate::importance::{FeatureImportancePipeline, FittedLapTimeModel};
use crate::segmenter::TelemetrySegmenter;
use crate::summary::RaceSummaryCalculator;
use crate::tables::TableReader;
use crate::timebase::Normalizer;
use crate::types::{
    CompoundStint, DriverSelection, DriverSeries, ImportanceReport, LapOptions, LapRecord,
    LapWindow, NormalizedLap, ResultRecord, SegmentedLap, SummaryRow, TelemetrySample,
};
use crate::views;
use crate::windows::LapWindowIndexer;

/// Race summary from a JSON results table.
///
/// # Arguments
/// * `results_json` - JSON array of results rows
///
/// # Returns
/// The summary table wrapped in a report envelope
pub fn results_to_summary_json(results_json: &str) -> Result<String, AnalysisError> {
    let results: Vec<ResultRecord> = TableReader::parse_array(results_json)?;
    let rows = RaceSummaryCalculator::summarize(&results);
    ReportEncoder::new().encode_to_json(ReportKind::Summary, rows)
}

/// Lap windows of one driver from a JSON lap table.
///
/// # Example
/// ```ignore
/// let report = laps_to_windows_json(laps_json, "VER")?;
/// ```
pub fn laps_to_windows_json(laps_json: &str, driver_id: &str) -> Result<String, AnalysisError> {
    let laps: Vec<LapRecord> = TableReader::parse_array(laps_json)?;
    let normalized = Normalizer::normalize_laps(&laps)?;
    let windows = LapWindowIndexer::index_driver(&normalized, driver_id)?;
    ReportEncoder::new().encode_to_json(ReportKind::LapWindows, windows)
}

/// Lap-time feature importance from a JSON lap table
pub fn laps_to_importance_json(
    laps_json: &str,
    config: &AnalysisConfig,
) -> Result<String, AnalysisError> {
    let laps: Vec<LapRecord> = TableReader::parse_array(laps_json)?;
    let analyzer = SessionAnalyzer::new(config.clone())?.with_laps(&laps)?;
    let report = analyzer.feature_importance()?;
    ReportEncoder::new().encode_to_json(ReportKind::FeatureImportance, report)
}

/// Per-session views for a driver selector and strategy charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionViews {
    pub drivers: DriverSelection,
    /// Lap options of the selected driver; absent for a session without laps
    pub lap_options: Option<LapOptions>,
    pub position_evolution: Vec<DriverSeries>,
    pub lap_time_series: Vec<DriverSeries>,
    pub compound_stints: Vec<CompoundStint>,
}

/// Analyzer over one loaded session.
///
/// Tables are normalized once on load; every query afterwards is read-only, so
/// an analyzer can be shared between threads.
#[derive(Debug, Clone)]
pub struct SessionAnalyzer {
    config: AnalysisConfig,
    laps: Vec<NormalizedLap>,
    results: Vec<ResultRecord>,
}

impl SessionAnalyzer {
    /// Create an analyzer with no tables loaded
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            laps: Vec::new(),
            results: Vec::new(),
        })
    }

    /// Load the lap table
    pub fn with_laps(mut self, laps: &[LapRecord]) -> Result<Self, AnalysisError> {
        self.laps = Normalizer::normalize_laps(laps)?;
        tracing::debug!(laps = self.laps.len(), "loaded lap table");
        Ok(self)
    }

    /// Load the results table
    pub fn with_results(mut self, results: Vec<ResultRecord>) -> Self {
        self.results = results;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn laps(&self) -> &[NormalizedLap] {
        &self.laps
    }

    pub fn driver_windows(&self, driver_id: &str) -> Result<Vec<LapWindow>, AnalysisError> {
        LapWindowIndexer::index_driver(&self.laps, driver_id)
    }

    /// Telemetry of one lap.
    ///
    /// `telemetry` may hold several drivers; only `driver_id`'s samples are
    /// considered, in the order given.
    pub fn lap_telemetry(
        &self,
        driver_id: &str,
        lap_number: u32,
        telemetry: &[TelemetrySample],
    ) -> Result<SegmentedLap, AnalysisError> {
        let windows = self.driver_windows(driver_id)?;
        let window = LapWindowIndexer::window_for(&windows, lap_number)?;

        let driver_samples: Vec<TelemetrySample> = telemetry
            .iter()
            .filter(|s| s.driver_id == driver_id)
            .cloned()
            .collect();
        let stream = Normalizer::normalize_telemetry(&driver_samples)?;

        TelemetrySegmenter::with_display(self.config.boundary_policy, self.config.display.clone())
            .segment(&stream, window)
    }

    pub fn race_summary(&self) -> Vec<SummaryRow> {
        RaceSummaryCalculator::summarize(&self.results)
    }

    pub fn feature_importance(&self) -> Result<ImportanceReport, AnalysisError> {
        FeatureImportancePipeline::new(self.config.importance.clone()).run(&self.laps)
    }

    pub fn fit_lap_time_model(&self) -> Result<FittedLapTimeModel, AnalysisError> {
        FeatureImportancePipeline::new(self.config.importance.clone()).fit(&self.laps)
    }

    /// Views for `driver_id`, or for the default selection when `None`
    pub fn session_views(&self, driver_id: Option<&str>) -> Result<SessionViews, AnalysisError> {
        let drivers = views::driver_list(&self.laps, self.config.default_selection);
        let selected = driver_id
            .map(str::to_string)
            .or_else(|| drivers.default.clone());

        let (lap_options, compound_stints) = match selected.as_deref() {
            Some(driver) => (
                Some(views::lap_options(&self.laps, driver)?),
                views::compound_stints(&self.laps, driver)?,
            ),
            None => (None, Vec::new()),
        };

        Ok(SessionViews {
            drivers,
            lap_options,
            position_evolution: views::position_evolution(&self.laps),
            lap_time_series: views::lap_time_series(&self.laps),
            compound_stints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryPolicy;
    use crate::error::ErrorKind;
    use crate::types::{Compound, DurationValue, NumericValue, SpeedTraps};
    use pretty_assertions::assert_eq;

    const LAP_SECONDS: f64 = 92.0;

    fn make_lap(driver_id: &str, lap_number: u32, compound: Compound) -> LapRecord {
        let offset = match driver_id {
            "VER" => 0.0,
            "LEC" => 0.4,
            _ => 0.9,
        };
        let start = 3600.0 + f64::from(lap_number - 1) * LAP_SECONDS + offset;
        LapRecord {
            driver_id: driver_id.to_string(),
            driver_number: None,
            lap_number,
            lap_start_time: Some(DurationValue::Seconds(start)),
            lap_time: Some(DurationValue::Text(format!(
                "0 days 00:01:{:06.3}",
                31.0 + f64::from(lap_number % 4) * 0.35 + offset
            ))),
            stint: Some(1.0),
            compound,
            tyre_life: Some(f64::from(lap_number)),
            is_fresh_tyre: Some(lap_number == 1),
            track_status: Some(NumericValue::Text("1".to_string())),
            speed_traps: SpeedTraps {
                speed_i1: Some(280.0 + f64::from(lap_number)),
                speed_i2: Some(255.0),
                speed_fl: Some(298.0 - offset),
                speed_st: Some(315.0 + f64::from(lap_number % 3)),
            },
            position: Some(match driver_id {
                "VER" => 1,
                "LEC" => 2,
                _ => 3,
            }),
        }
    }

    /// Three drivers over five laps; HAM retires and has no lap 3 row
    fn make_session_laps() -> Vec<LapRecord> {
        let mut laps = Vec::new();
        for driver in ["VER", "LEC", "HAM"] {
            for lap in 1..=5 {
                if driver == "HAM" && lap == 3 {
                    continue;
                }
                laps.push(make_lap(driver, lap, Compound::Medium));
            }
        }
        laps
    }

    fn make_telemetry(driver_id: &str, from: f64, to: f64, step: f64) -> Vec<TelemetrySample> {
        let mut samples = Vec::new();
        let mut t = from;
        while t <= to {
            samples.push(TelemetrySample {
                driver_id: driver_id.to_string(),
                session_time: DurationValue::Seconds(t),
                rpm: 11000.0,
                speed: 290.0,
                throttle: 100.0,
                gear: 8,
            });
            t += step;
        }
        samples
    }

    fn make_result(driver_id: &str, grid: &str, classified: &str) -> ResultRecord {
        ResultRecord {
            driver_id: driver_id.to_string(),
            abbreviation: driver_id.to_string(),
            grid_position: Some(NumericValue::Text(grid.to_string())),
            classified_position: Some(NumericValue::Text(classified.to_string())),
        }
    }

    fn make_analyzer() -> SessionAnalyzer {
        SessionAnalyzer::new(AnalysisConfig::default())
            .unwrap()
            .with_laps(&make_session_laps())
            .unwrap()
    }

    #[test]
    fn test_retired_driver_has_no_window_across_the_gap() {
        let analyzer = make_analyzer();

        assert_eq!(analyzer.driver_windows("VER").unwrap().len(), 5);
        assert_eq!(analyzer.driver_windows("LEC").unwrap().len(), 5);

        let ham = analyzer.driver_windows("HAM").unwrap();
        let lap_numbers: Vec<u32> = ham.iter().map(|w| w.lap_number).collect();
        assert_eq!(lap_numbers, vec![1, 2, 4, 5]);
        assert_eq!(ham[1].end_time_seconds, Some(ham[2].start_time_seconds));
    }

    #[test]
    fn test_windows_tile_lap_starts() {
        let analyzer = make_analyzer();
        for driver in ["VER", "LEC", "HAM"] {
            let windows = analyzer.driver_windows(driver).unwrap();
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end_time_seconds, Some(pair[1].start_time_seconds));
            }
            assert!(windows.last().unwrap().is_final());
        }
    }

    #[test]
    fn test_summary_coercion() {
        let analyzer = make_analyzer().with_results(vec![
            make_result("LEC", "3", "7"),
            make_result("SAR", "DNF", "DNF"),
        ]);

        let summary = analyzer.race_summary();
        assert_eq!(summary[0].position_change, -4);
        assert_eq!(summary[1].grid_position, 0);
        assert_eq!(summary[1].classified_position, 0);
        assert_eq!(summary[1].position_change, 0);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let first = RaceSummaryCalculator::summarize(&[
            make_result("VER", "2", "1"),
            make_result("LEC", "3", "7"),
        ]);
        let records: Vec<ResultRecord> = first.iter().map(ResultRecord::from).collect();
        let second = RaceSummaryCalculator::summarize(&records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_final_lap_telemetry_runs_to_stream_end() {
        let analyzer = make_analyzer();
        let final_start = 3600.0 + 4.0 * LAP_SECONDS;
        let stream_end = final_start + 200.0;
        let mut telemetry = make_telemetry("VER", 3600.0, stream_end, 0.5);
        telemetry.extend(make_telemetry("LEC", 3600.0, stream_end, 0.5));

        let segment = analyzer.lap_telemetry("VER", 5, &telemetry).unwrap();
        assert!(segment.window.is_final());
        assert_eq!(segment.lap_start_marker, final_start);

        let expected = telemetry
            .iter()
            .filter(|s| s.driver_id == "VER")
            .filter(|s| matches!(s.session_time, DurationValue::Seconds(t) if t >= final_start))
            .count();
        assert_eq!(segment.samples.len(), expected);
        assert!(segment.samples.iter().all(|s| s.sample.driver_id == "VER"));
        assert_eq!(
            segment.samples.last().map(|s| s.sample.session_time_s),
            Some(stream_end)
        );
    }

    #[test]
    fn test_lap_without_telemetry_is_empty_not_error() {
        let analyzer = make_analyzer();
        let telemetry = make_telemetry("VER", 0.0, 100.0, 1.0);

        let segment = analyzer.lap_telemetry("VER", 2, &telemetry).unwrap();
        assert!(segment.is_empty());
    }

    #[test]
    fn test_shared_boundary_sample_under_each_policy() {
        let laps = make_session_laps();
        let boundary = 3600.0 + LAP_SECONDS;
        let telemetry = make_telemetry("VER", 3600.0, boundary + 10.0, 0.5);

        let inclusive = make_analyzer();
        let lap_1 = inclusive.lap_telemetry("VER", 1, &telemetry).unwrap();
        let lap_2 = inclusive.lap_telemetry("VER", 2, &telemetry).unwrap();
        assert_eq!(lap_1.samples.last().unwrap().sample.session_time_s, boundary);
        assert_eq!(lap_2.samples[0].sample.session_time_s, boundary);

        let config = AnalysisConfig {
            boundary_policy: BoundaryPolicy::HalfOpen,
            ..AnalysisConfig::default()
        };
        let half_open = SessionAnalyzer::new(config).unwrap().with_laps(&laps).unwrap();
        let lap_1 = half_open.lap_telemetry("VER", 1, &telemetry).unwrap();
        assert!(lap_1.samples.last().unwrap().sample.session_time_s < boundary);
        assert_eq!(lap_1.boundary_policy, BoundaryPolicy::HalfOpen);
    }

    #[test]
    fn test_unknown_lap_and_driver() {
        let analyzer = make_analyzer();
        let err = analyzer.lap_telemetry("HAM", 3, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = analyzer.driver_windows("BOT").unwrap_err();
        assert!(matches!(err, AnalysisError::DriverNotFound(_)));
    }

    #[test]
    fn test_single_compound_importance_is_zero() {
        let analyzer = make_analyzer();
        let report = analyzer.feature_importance().unwrap();

        assert_eq!(report.entries.len(), 10);
        let compound = report
            .entries
            .iter()
            .find(|e| e.feature_name == "compound")
            .unwrap();
        assert!(compound.importance_score.abs() < 1e-9);
        assert_eq!(report.compound_encoding.len(), 1);
    }

    #[test]
    fn test_importance_is_deterministic() {
        let analyzer = make_analyzer();
        assert_eq!(
            analyzer.feature_importance().unwrap(),
            analyzer.feature_importance().unwrap()
        );
    }

    #[test]
    fn test_session_views_default_driver() {
        let analyzer = make_analyzer();
        let views = analyzer.session_views(None).unwrap();

        assert_eq!(views.drivers.drivers, vec!["VER", "LEC", "HAM"]);
        assert_eq!(views.drivers.default.as_deref(), Some("VER"));
        let options = views.lap_options.unwrap();
        assert_eq!(options.laps, vec![1, 2, 3, 4, 5]);
        assert_eq!(options.default, 1);
        assert_eq!(views.compound_stints.len(), 1);
        assert_eq!(views.position_evolution.len(), 3);

        let ham = analyzer.session_views(Some("HAM")).unwrap();
        assert_eq!(ham.lap_options.unwrap().laps, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalysisConfig::default();
        config.importance.test_fraction = 1.5;
        let err = SessionAnalyzer::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_json_helpers() {
        let laps_json = serde_json::to_string(&make_session_laps()).unwrap();
        let windows: serde_json::Value =
            serde_json::from_str(&laps_to_windows_json(&laps_json, "HAM").unwrap()).unwrap();
        assert_eq!(windows["kind"], "lap_windows");
        assert_eq!(windows["rows"].as_array().unwrap().len(), 4);

        let results_json = r#"[{"driver_id": "16", "abbreviation": "LEC", "grid_position": "3", "classified_position": 7.0}]"#;
        let summary: serde_json::Value =
            serde_json::from_str(&results_to_summary_json(results_json).unwrap()).unwrap();
        assert_eq!(summary["rows"][0]["position_change"], -4);

        let importance: serde_json::Value = serde_json::from_str(
            &laps_to_importance_json(&laps_json, &AnalysisConfig::default()).unwrap(),
        )
        .unwrap();
        assert_eq!(importance["kind"], "feature_importance");
        assert_eq!(importance["rows"]["entries"].as_array().unwrap().len(), 10);
    }
}
