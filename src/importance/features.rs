//! Feature selection and categorical encoding for lap-time models
//!
//! The feature set is fixed; there is no automatic discovery. The compound is
//! the only categorical column and is label-encoded per fit.

use std::collections::BTreeSet;

use crate::types::{Compound, EncodedLabel, NormalizedLap};

/// A column of the lap-time feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    DriverNumber,
    LapNumber,
    Stint,
    SpeedI1,
    SpeedI2,
    SpeedFl,
    SpeedSt,
    Compound,
    TyreLife,
    FreshTyre,
    TrackStatus,
}

/// Default feature set, in ranking tie-break order
pub const DEFAULT_FEATURES: [FeatureColumn; 10] = [
    FeatureColumn::LapNumber,
    FeatureColumn::Stint,
    FeatureColumn::SpeedI1,
    FeatureColumn::SpeedI2,
    FeatureColumn::SpeedFl,
    FeatureColumn::SpeedSt,
    FeatureColumn::Compound,
    FeatureColumn::TyreLife,
    FeatureColumn::FreshTyre,
    FeatureColumn::TrackStatus,
];

impl FeatureColumn {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::DriverNumber => "driver_number",
            FeatureColumn::LapNumber => "lap_number",
            FeatureColumn::Stint => "stint",
            FeatureColumn::SpeedI1 => "speed_i1",
            FeatureColumn::SpeedI2 => "speed_i2",
            FeatureColumn::SpeedFl => "speed_fl",
            FeatureColumn::SpeedSt => "speed_st",
            FeatureColumn::Compound => "compound",
            FeatureColumn::TyreLife => "tyre_life",
            FeatureColumn::FreshTyre => "is_fresh_tyre",
            FeatureColumn::TrackStatus => "track_status",
        }
    }

    /// Raw value of this column for a lap; `None` means missing
    fn extract(&self, lap: &NormalizedLap, encoder: &CompoundEncoder) -> Option<f64> {
        match self {
            FeatureColumn::DriverNumber => lap.driver_number.map(f64::from),
            FeatureColumn::LapNumber => Some(f64::from(lap.lap_number)),
            FeatureColumn::Stint => lap.stint,
            FeatureColumn::SpeedI1 => lap.speed_traps.speed_i1,
            FeatureColumn::SpeedI2 => lap.speed_traps.speed_i2,
            FeatureColumn::SpeedFl => lap.speed_traps.speed_fl,
            FeatureColumn::SpeedSt => lap.speed_traps.speed_st,
            FeatureColumn::Compound => encoder.transform(lap.compound).map(f64::from),
            FeatureColumn::TyreLife => lap.tyre_life,
            FeatureColumn::FreshTyre => lap.is_fresh_tyre.map(|fresh| if fresh { 1.0 } else { 0.0 }),
            FeatureColumn::TrackStatus => lap.track_status,
        }
        .filter(|v| v.is_finite())
    }
}

/// Feature columns for a run, optionally led by the car number
pub fn feature_columns(include_driver_number: bool) -> Vec<FeatureColumn> {
    let mut columns = Vec::with_capacity(DEFAULT_FEATURES.len() + 1);
    if include_driver_number {
        columns.push(FeatureColumn::DriverNumber);
    }
    columns.extend_from_slice(&DEFAULT_FEATURES);
    columns
}

/// Label encoder for tyre compounds.
///
/// Codes follow the sorted order of the labels seen in one fit, so the same
/// compound can get a different code in another session.
#[derive(Debug, Clone, Default)]
pub struct CompoundEncoder {
    labels: Vec<Compound>,
}

impl CompoundEncoder {
    pub fn fit<'a, I>(compounds: I) -> Self
    where
        I: IntoIterator<Item = &'a Compound>,
    {
        let sorted: BTreeSet<&'static str> = compounds.into_iter().map(|c| c.as_str()).collect();
        let labels = sorted
            .into_iter()
            .map(|label| Compound::from(Some(label.to_string())))
            .collect();
        Self { labels }
    }

    /// Code of a compound; `None` when the compound was not seen during fit
    pub fn transform(&self, compound: Compound) -> Option<u32> {
        self.labels
            .iter()
            .position(|c| *c == compound)
            .and_then(|idx| u32::try_from(idx).ok())
    }

    pub fn mapping(&self) -> Vec<EncodedLabel> {
        self.labels
            .iter()
            .zip(0u32..)
            .map(|(compound, code)| EncodedLabel {
                label: compound.as_str().to_string(),
                code,
            })
            .collect()
    }
}

/// Build the raw (pre-imputation) feature matrix, one row per lap
pub fn build_matrix(
    laps: &[&NormalizedLap],
    columns: &[FeatureColumn],
    encoder: &CompoundEncoder,
) -> Vec<Vec<Option<f64>>> {
    laps.iter()
        .map(|lap| columns.iter().map(|c| c.extract(lap, encoder)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpeedTraps;

    fn make_lap(compound: Compound) -> NormalizedLap {
        NormalizedLap {
            driver_id: "PER".to_string(),
            driver_number: Some(11),
            lap_number: 12,
            lap_start_s: Some(1000.0),
            lap_time_s: Some(91.2),
            stint: Some(2.0),
            compound,
            tyre_life: Some(5.0),
            is_fresh_tyre: Some(true),
            track_status: Some(1.0),
            speed_traps: SpeedTraps {
                speed_i1: Some(290.0),
                speed_i2: None,
                speed_fl: Some(300.0),
                speed_st: Some(f64::NAN),
            },
            position: Some(3),
        }
    }

    #[test]
    fn test_encoder_uses_sorted_labels() {
        let encoder =
            CompoundEncoder::fit(&[Compound::Soft, Compound::Hard, Compound::Medium, Compound::Soft]);
        assert_eq!(encoder.transform(Compound::Hard), Some(0));
        assert_eq!(encoder.transform(Compound::Medium), Some(1));
        assert_eq!(encoder.transform(Compound::Soft), Some(2));
        assert_eq!(encoder.transform(Compound::Wet), None);
        assert_eq!(encoder.mapping().len(), 3);
    }

    #[test]
    fn test_feature_columns() {
        assert_eq!(feature_columns(false).len(), 10);
        let with_driver = feature_columns(true);
        assert_eq!(with_driver[0], FeatureColumn::DriverNumber);
        assert_eq!(with_driver.len(), 11);
    }

    #[test]
    fn test_build_matrix_marks_missing() {
        let lap = make_lap(Compound::Soft);
        let encoder = CompoundEncoder::fit(&[Compound::Medium, Compound::Soft]);
        let columns = feature_columns(false);
        let matrix = build_matrix(&[&lap], &columns, &encoder);

        let row = &matrix[0];
        assert_eq!(row[0], Some(12.0));
        assert_eq!(row[3], None);
        assert_eq!(row[5], None, "NaN readings count as missing");
        assert_eq!(row[6], Some(1.0));
        assert_eq!(row[8], Some(1.0));
    }
}
