//! Telemetry segmentation
//!
//! Cuts a driver's continuous telemetry stream down to the samples inside one
//! lap window. The stream is sorted by session time, so the segment is always a
//! contiguous slice located by binary search.

use crate::config::{BoundaryPolicy, DisplayConfig};
use crate::error::AnalysisError;
use crate::types::{LapWindow, NormalizedSample, SegmentedLap, SegmentedSample};

/// Segmenter for restricting telemetry to a lap window
pub struct TelemetrySegmenter {
    policy: BoundaryPolicy,
    display: DisplayConfig,
}

impl Default for TelemetrySegmenter {
    fn default() -> Self {
        Self::new(BoundaryPolicy::default())
    }
}

impl TelemetrySegmenter {
    pub fn new(policy: BoundaryPolicy) -> Self {
        Self {
            policy,
            display: DisplayConfig::default(),
        }
    }

    pub fn with_display(policy: BoundaryPolicy, display: DisplayConfig) -> Self {
        Self { policy, display }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Return the samples of `stream` that fall inside `window`.
    ///
    /// The stream must belong to the window's driver and be ordered by session
    /// time. An empty slice is a valid result.
    pub fn slice<'a>(
        &self,
        stream: &'a [NormalizedSample],
        window: &LapWindow,
    ) -> Result<&'a [NormalizedSample], AnalysisError> {
        validate_stream(stream, &window.driver_id)?;

        let start = window.start_time_seconds;
        let first = stream.partition_point(|s| s.session_time_s < start);
        let last = match (window.end_time_seconds, self.policy) {
            (None, _) => stream.len(),
            (Some(end), BoundaryPolicy::InclusiveInclusive) => {
                stream.partition_point(|s| s.session_time_s <= end)
            }
            (Some(end), BoundaryPolicy::HalfOpen) => {
                stream.partition_point(|s| s.session_time_s < end)
            }
        };

        Ok(&stream[first..last.max(first)])
    }

    /// Segment a lap and attach the display columns
    pub fn segment(
        &self,
        stream: &[NormalizedSample],
        window: &LapWindow,
    ) -> Result<SegmentedLap, AnalysisError> {
        let samples = self
            .slice(stream, window)?
            .iter()
            .map(|sample| SegmentedSample {
                rpm_display: sample.rpm * self.display.rpm_scale,
                sample: sample.clone(),
            })
            .collect::<Vec<_>>();

        if samples.is_empty() {
            tracing::debug!(
                driver = %window.driver_id,
                lap = window.lap_number,
                "no telemetry inside lap window"
            );
        }

        Ok(SegmentedLap {
            window: window.clone(),
            lap_start_marker: window.start_time_seconds,
            boundary_policy: self.policy,
            samples,
        })
    }
}

fn validate_stream(stream: &[NormalizedSample], driver_id: &str) -> Result<(), AnalysisError> {
    if let Some(other) = stream.iter().find(|s| s.driver_id != driver_id) {
        return Err(AnalysisError::MalformedInput(format!(
            "telemetry stream for driver {} contains samples of driver {}",
            driver_id, other.driver_id
        )));
    }

    if let Some(idx) = stream
        .windows(2)
        .position(|pair| pair[1].session_time_s < pair[0].session_time_s)
    {
        return Err(AnalysisError::MalformedInput(format!(
            "telemetry for driver {} goes back in time at sample {}",
            driver_id,
            idx + 1
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_stream(driver: &str, times: &[f64]) -> Vec<NormalizedSample> {
        times
            .iter()
            .map(|&t| NormalizedSample {
                driver_id: driver.to_string(),
                session_time_s: t,
                rpm: 11_000.0,
                speed: 280.0,
                throttle: 99.0,
                gear: 7,
            })
            .collect()
    }

    fn make_window(start: f64, end: Option<f64>) -> LapWindow {
        LapWindow {
            driver_id: "VER".to_string(),
            lap_number: 2,
            start_time_seconds: start,
            end_time_seconds: end,
        }
    }

    fn times(samples: &[NormalizedSample]) -> Vec<f64> {
        samples.iter().map(|s| s.session_time_s).collect()
    }

    #[test]
    fn test_inclusive_boundaries() {
        let stream = make_stream("VER", &[9.0, 10.0, 11.0, 15.0, 20.0, 21.0]);
        let segmenter = TelemetrySegmenter::default();
        let slice = segmenter.slice(&stream, &make_window(10.0, Some(20.0))).unwrap();
        assert_eq!(times(slice), vec![10.0, 11.0, 15.0, 20.0]);
    }

    #[test]
    fn test_half_open_boundaries() {
        let stream = make_stream("VER", &[9.0, 10.0, 11.0, 15.0, 20.0, 21.0]);
        let segmenter = TelemetrySegmenter::new(BoundaryPolicy::HalfOpen);
        let slice = segmenter.slice(&stream, &make_window(10.0, Some(20.0))).unwrap();
        assert_eq!(times(slice), vec![10.0, 11.0, 15.0]);
    }

    #[test]
    fn test_boundary_sample_shared_by_adjacent_laps() {
        let stream = make_stream("VER", &[10.0, 15.0, 20.0, 25.0, 30.0]);
        let segmenter = TelemetrySegmenter::default();

        let lap_two = segmenter.slice(&stream, &make_window(10.0, Some(20.0))).unwrap();
        let mut lap_three_window = make_window(20.0, Some(30.0));
        lap_three_window.lap_number = 3;
        let lap_three = segmenter.slice(&stream, &lap_three_window).unwrap();

        assert_eq!(lap_two.last().unwrap().session_time_s, 20.0);
        assert_eq!(lap_three.first().unwrap().session_time_s, 20.0);

        let half_open = TelemetrySegmenter::new(BoundaryPolicy::HalfOpen);
        let a = half_open.slice(&stream, &make_window(10.0, Some(20.0))).unwrap();
        let b = half_open.slice(&stream, &lap_three_window).unwrap();
        assert_eq!(a.len() + b.len(), 4);
    }

    #[test]
    fn test_final_lap_runs_to_stream_end() {
        let stream = make_stream("VER", &[5.0, 10.0, 12.0, 500.0]);
        let slice = TelemetrySegmenter::default()
            .slice(&stream, &make_window(10.0, None))
            .unwrap();
        assert_eq!(times(slice), vec![10.0, 12.0, 500.0]);
    }

    #[test]
    fn test_no_samples_in_range_is_empty() {
        let stream = make_stream("VER", &[1.0, 2.0, 3.0]);
        let segmented = TelemetrySegmenter::default()
            .segment(&stream, &make_window(100.0, Some(190.0)))
            .unwrap();
        assert!(segmented.is_empty());

        let empty: Vec<NormalizedSample> = Vec::new();
        let slice = TelemetrySegmenter::default()
            .slice(&empty, &make_window(0.0, None))
            .unwrap();
        assert!(slice.is_empty());
    }

    #[test]
    fn test_display_column_does_not_alter_values() {
        let stream = make_stream("VER", &[10.0]);
        let segmented = TelemetrySegmenter::default()
            .segment(&stream, &make_window(10.0, None))
            .unwrap();

        let sample = &segmented.samples[0];
        assert!((sample.rpm_display - 110.0).abs() < 1e-9);
        assert_eq!(sample.sample, stream[0]);
        assert_eq!(segmented.lap_start_marker, 10.0);
    }

    #[test]
    fn test_rejects_foreign_driver() {
        let stream = make_stream("HAM", &[10.0]);
        let result = TelemetrySegmenter::default().slice(&stream, &make_window(0.0, None));
        assert!(matches!(result, Err(AnalysisError::MalformedInput(_))));
    }

    #[test]
    fn test_rejects_unordered_stream() {
        let stream = make_stream("VER", &[10.0, 9.0]);
        let result = TelemetrySegmenter::default().slice(&stream, &make_window(0.0, None));
        assert!(matches!(result, Err(AnalysisError::MalformedInput(_))));
    }
}
