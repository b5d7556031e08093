use engine_core::IndicatorRow;
use serde::{Deserialize, Serialize};

/// One scoring band: a value above `threshold` earns `points`. Points may be
/// fractional or negative (penalty bands).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBand {
    pub threshold: f64,
    pub points: f64,
}

/// Ordered bands for one indicator field, evaluated left-to-right; every
/// band the value clears contributes its points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBands {
    pub field: String,
    pub bands: Vec<ScoreBand>,
}

impl FieldBands {
    pub fn new(field: impl Into<String>, bands: Vec<(f64, f64)>) -> Self {
        Self {
            field: field.into(),
            bands: bands
                .into_iter()
                .map(|(threshold, points)| ScoreBand { threshold, points })
                .collect(),
        }
    }
}

/// Strategy-specific rule table: band lists per indicator, summed across
/// fields, floored to an integer, clamped to `[0, max_score]`. Tables are
/// plain data so strategies can be swapped without touching the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreTable {
    pub fields: Vec<FieldBands>,
    pub max_score: u32,
}

impl ScoreTable {
    pub fn score(&self, row: &IndicatorRow) -> u32 {
        let mut total = 0.0;
        for field_bands in &self.fields {
            let Some(value) = row.get(&field_bands.field) else {
                continue;
            };
            for band in &field_bands.bands {
                if value > band.threshold {
                    total += band.points;
                }
            }
        }
        (total.floor().max(0.0) as u32).min(self.max_score)
    }
}
