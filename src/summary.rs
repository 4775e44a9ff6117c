//! Race summary
//!
//! Projects the results table into per-driver summary rows with the number of
//! places gained or lost between grid and classification.
//! - Positions are coerced to whole numbers, truncating fractions
//! - Unparsable positions ("DNF", "NC", missing) fall back to 0
//!
//! The fallback keeps the table renderable, but a driver who did not start or
//! was not classified gets a position change computed against 0, which is not
//! a real position.

use crate::types::{NumericValue, ResultRecord, SummaryRow};

/// Calculator for race summary rows
pub struct RaceSummaryCalculator;

impl RaceSummaryCalculator {
    /// Summarize results, one row per input row in input order
    pub fn summarize(results: &[ResultRecord]) -> Vec<SummaryRow> {
        results
            .iter()
            .map(|r| {
                let grid_position = coerce_position(r.grid_position.as_ref());
                let classified_position = coerce_position(r.classified_position.as_ref());

                if grid_position.is_none() || classified_position.is_none() {
                    tracing::warn!(
                        driver = %r.driver_id,
                        grid = ?r.grid_position,
                        classified = ?r.classified_position,
                        "position not numeric, using 0"
                    );
                }

                let grid_position = grid_position.unwrap_or(0);
                let classified_position = classified_position.unwrap_or(0);
                let position_change = grid_position
                    .checked_sub(classified_position)
                    .unwrap_or_else(|| {
                        tracing::warn!(
                            driver = %r.driver_id,
                            grid_position,
                            classified_position,
                            "position change out of range, using 0"
                        );
                        0
                    });

                SummaryRow {
                    driver_id: r.driver_id.clone(),
                    abbreviation: r.abbreviation.clone(),
                    grid_position,
                    classified_position,
                    position_change,
                }
            })
            .collect()
    }

    /// Sum of places gained over all drivers that gained places
    pub fn total_places_gained(rows: &[SummaryRow]) -> i32 {
        rows.iter()
            .map(|r| r.position_change.max(0))
            .fold(0, i32::saturating_add)
    }
}

/// Coerce a position to a whole number; `None` when it is not numeric
pub fn coerce_position(value: Option<&NumericValue>) -> Option<i32> {
    let position = value?.as_f64()?.trunc();
    if position < f64::from(i32::MIN) || position > f64::from(i32::MAX) {
        return None;
    }
    Some(position as i32)
}
