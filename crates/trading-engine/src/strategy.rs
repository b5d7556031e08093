use candidate_ranker::{rank, FieldBands, Predicate, RankSpec, ScoreTable, SortKey};
use engine_core::{EngineResult, IndicatorRow, RankedCandidate, TrendBar, TrendState};
use trend_signal::{TrendClassifier, TrendParams};

use crate::config::EngineConfig;

/// Indicator columns every strategy variant requests from the screener.
pub const SCREEN_COLUMNS: &[&str] = &["relative_volume", "money_flow", "rsi", "adx", "atr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Confirmed,
    Denied,
    /// Not enough history for a defined trend state.
    NoSignal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDecision {
    Hold,
    Exit(String),
}

/// Strategy variants as tagged implementations: each owns its ranking
/// recipe and trend classifier, dispatched by match — swapping a variant
/// never touches the engine loops.
pub enum Strategy {
    /// Unusual-volume momentum: relative volume leads the ordering, the
    /// rule-table score breaks ties.
    VolumeSurge {
        spec: RankSpec,
        classifier: TrendClassifier,
    },
    /// Rule-table led: the integer score leads, relative volume breaks ties.
    ScoreLed {
        spec: RankSpec,
        classifier: TrendClassifier,
    },
}

fn score_table() -> ScoreTable {
    ScoreTable {
        fields: vec![
            FieldBands::new("relative_volume", vec![(3.0, 1.0), (5.0, 1.0), (8.0, 1.0)]),
            FieldBands::new("adx", vec![(20.0, 0.5), (30.0, 0.5)]),
            // Overbought penalty
            FieldBands::new("rsi", vec![(70.0, -1.0)]),
        ],
        max_score: 4,
    }
}

fn base_spec(config: &EngineConfig, score_primary: bool) -> RankSpec {
    RankSpec {
        predicates: vec![
            Predicate::gt("relative_volume", config.min_relative_volume),
            Predicate::lt("rsi", 75.0),
        ],
        score_table: score_table(),
        sort_keys: vec![SortKey::desc("relative_volume")],
        score_primary,
        limit: config.candidate_limit,
    }
}

impl Strategy {
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let classifier = TrendClassifier::new(TrendParams {
            bandwidth: config.trend_bandwidth,
            relative_weight: config.trend_relative_weight,
            lag: config.trend_lag,
            crossover_mode: config.trend_crossover_mode,
        })?;

        Ok(match config.strategy_variant.as_str() {
            "score_led" => Strategy::ScoreLed {
                spec: base_spec(config, true),
                classifier,
            },
            _ => Strategy::VolumeSurge {
                spec: base_spec(config, false),
                classifier,
            },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::VolumeSurge { .. } => "volume_surge",
            Strategy::ScoreLed { .. } => "score_led",
        }
    }

    fn spec(&self) -> &RankSpec {
        match self {
            Strategy::VolumeSurge { spec, .. } | Strategy::ScoreLed { spec, .. } => spec,
        }
    }

    fn classifier(&self) -> &TrendClassifier {
        match self {
            Strategy::VolumeSurge { classifier, .. } | Strategy::ScoreLed { classifier, .. } => {
                classifier
            }
        }
    }

    /// Filter, score, and order a fresh snapshot.
    pub fn candidates(&self, snapshot: &[IndicatorRow]) -> Vec<RankedCandidate> {
        rank(self.spec(), snapshot)
    }

    /// Latest classifier state for a close history, if defined.
    pub fn signal(&self, closes: &[f64]) -> Option<TrendBar> {
        self.classifier().latest(closes)
    }

    /// Confirm or deny an entry from recent price history.
    pub fn confirm_entry(&self, closes: &[f64]) -> EntryDecision {
        match self.signal(closes).and_then(|bar| bar.state) {
            Some(TrendState::Bullish) => EntryDecision::Confirmed,
            Some(TrendState::Bearish) => EntryDecision::Denied,
            None => EntryDecision::NoSignal,
        }
    }

    /// Exit when the trend flips bearish or the position breaches the
    /// drawdown floor. Insufficient history holds the position — the venue
    /// stop orders remain the protective layer.
    pub fn check_exit(&self, closes: &[f64], pnl_percent: f64, pnl_floor_pct: f64) -> ExitDecision {
        if pnl_percent <= pnl_floor_pct {
            return ExitDecision::Exit(format!(
                "unrealized P&L {pnl_percent:.2}% breached floor {pnl_floor_pct:.2}%"
            ));
        }
        match self.signal(closes).and_then(|bar| bar.state) {
            Some(TrendState::Bearish) => ExitDecision::Exit("trend turned bearish".to_string()),
            _ => ExitDecision::Hold,
        }
    }
}
