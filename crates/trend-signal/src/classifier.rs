use engine_core::{EngineError, EngineResult, TrendBar, TrendState};
use serde::{Deserialize, Serialize};

use crate::kernel::kernel_estimate;

/// Kernel-regression classifier parameters.
///
/// `bandwidth` is the trailing window for the primary estimate;
/// the secondary estimate uses `bandwidth - lag` so it reacts earlier.
/// `crossover_mode` switches the per-bar state (and the alert wiring) from
/// the bar-to-bar rate of the primary estimate to the secondary-over-primary
/// crossover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendParams {
    pub bandwidth: usize,
    pub relative_weight: f64,
    pub lag: usize,
    pub crossover_mode: bool,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            bandwidth: 8,
            relative_weight: 8.0,
            lag: 2,
            crossover_mode: false,
        }
    }
}

/// Stateless trend classifier. `states` recomputes from scratch over any
/// close snapshot and yields one `TrendBar` per input bar lazily; nothing is
/// carried between calls.
#[derive(Debug, Clone)]
pub struct TrendClassifier {
    params: TrendParams,
}

impl TrendClassifier {
    pub fn new(params: TrendParams) -> EngineResult<Self> {
        if params.bandwidth == 0 {
            return Err(EngineError::InvalidOperation(
                "bandwidth must be positive".to_string(),
            ));
        }
        if params.lag >= params.bandwidth {
            return Err(EngineError::InvalidOperation(format!(
                "lag {} must be smaller than bandwidth {}",
                params.lag, params.bandwidth
            )));
        }
        if params.relative_weight <= 0.0 {
            return Err(EngineError::InvalidOperation(
                "relative weight must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &TrendParams {
        &self.params
    }

    /// Lazy, finite, restartable per-bar state sequence for a close series.
    pub fn states<'a>(&self, closes: &'a [f64]) -> TrendIter<'a> {
        TrendIter {
            closes,
            params: self.params,
            index: 0,
            prev_state: None,
        }
    }

    /// State of the most recent bar, or `None` when the series is too short
    /// for a defined state ("no signal", not an error).
    pub fn latest(&self, closes: &[f64]) -> Option<TrendBar> {
        self.states(closes).last().filter(|b| b.state.is_some())
    }
}

pub struct TrendIter<'a> {
    closes: &'a [f64],
    params: TrendParams,
    index: usize,
    prev_state: Option<TrendState>,
}

impl TrendIter<'_> {
    fn estimate(&self, index: Option<usize>, bandwidth: usize) -> Option<f64> {
        kernel_estimate(self.closes, index?, bandwidth, self.params.relative_weight)
    }
}

impl Iterator for TrendIter<'_> {
    type Item = TrendBar;

    fn next(&mut self) -> Option<TrendBar> {
        if self.index >= self.closes.len() {
            return None;
        }
        let n = self.index;
        self.index += 1;

        let h = self.params.bandwidth;
        let h2 = self.params.bandwidth - self.params.lag;
        let prev = n.checked_sub(1);
        let prev2 = n.checked_sub(2);

        let est1 = self.estimate(Some(n), h);
        let est1_prev = self.estimate(prev, h);
        let est1_prev2 = self.estimate(prev2, h);
        let est2 = self.estimate(Some(n), h2);
        let est2_prev = self.estimate(prev, h2);

        // Rate events: the slope of the primary estimate flips sign.
        let (turned_bullish, turned_bearish) = match (est1, est1_prev, est1_prev2) {
            (Some(now), Some(p), Some(pp)) => (now > p && pp > p, now < p && pp < p),
            _ => (false, false),
        };

        // Cross events: the faster secondary estimate crosses the primary.
        let (bullish_cross, bearish_cross) = match (est1, est2, est1_prev, est2_prev) {
            (Some(a1), Some(a2), Some(p1), Some(p2)) => {
                (p2 < p1 && a2 > a1, p2 > p1 && a2 < a1)
            }
            _ => (false, false),
        };

        let state = if self.params.crossover_mode {
            match (est1, est2) {
                (Some(a1), Some(a2)) if a2 > a1 => Some(TrendState::Bullish),
                (Some(a1), Some(a2)) if a2 < a1 => Some(TrendState::Bearish),
                (Some(_), Some(_)) => self.prev_state,
                _ => None,
            }
        } else {
            match (est1, est1_prev) {
                (Some(now), Some(p)) if now > p => Some(TrendState::Bullish),
                (Some(now), Some(p)) if now < p => Some(TrendState::Bearish),
                // A flat bar is neither a bullish nor a bearish rate.
                (Some(_), Some(_)) => self.prev_state,
                _ => None,
            }
        };
        self.prev_state = state;

        let (alert_bullish, alert_bearish) = if self.params.crossover_mode {
            (bullish_cross, bearish_cross)
        } else {
            (turned_bullish, turned_bearish)
        };

        Some(TrendBar {
            estimate: est1,
            secondary: est2,
            state,
            turned_bullish,
            turned_bearish,
            bullish_cross,
            bearish_cross,
            alert_bullish,
            alert_bearish,
        })
    }
}
