use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Chronologically ordered, append-only price history bounded to a lookback
/// window measured in calendar days. Bars older than the window are evicted
/// on push; missing bars are simply absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    lookback_days: i64,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(lookback_days: i64) -> Self {
        Self {
            lookback_days,
            bars: Vec::new(),
        }
    }

    pub fn from_bars(lookback_days: i64, bars: Vec<Bar>) -> EngineResult<Self> {
        let mut series = Self::new(lookback_days);
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    /// Append a bar. Rejects out-of-order timestamps and drops bars that
    /// fall out of the lookback window.
    pub fn push(&mut self, bar: Bar) -> EngineResult<()> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::InvalidOperation(format!(
                    "bar at {} is not after the latest bar at {}",
                    bar.timestamp, last.timestamp
                )));
            }
        }
        let cutoff = bar.timestamp - Duration::days(self.lookback_days);
        self.bars.push(bar);
        self.bars.retain(|b| b.timestamp >= cutoff);
        Ok(())
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Candle interval for venue price history requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarInterval {
    Hour,
    Day,
}

/// A tradable instrument once fully resolved: directory id plus venue
/// trading metadata. Immutable after resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub venue_id: String,
    pub lot_size: i64,
    pub price_increment: Decimal,
}

/// One screener row: a symbol plus its named numeric indicators
/// (relative volume, money flow, RSI, ADX, ATR, ...). Produced fresh each
/// poll, never retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub symbol: String,
    pub indicators: HashMap<String, f64>,
}

impl IndicatorRow {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            indicators: HashMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.indicators.get(field).copied()
    }
}

/// A screener row that passed every predicate, annotated with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub row: IndicatorRow,
    pub score: u32,
}

/// Directional state of the kernel trend classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    Bullish,
    Bearish,
}

/// Per-bar classifier output. Estimates are `None` while the series is
/// shorter than the bandwidth. Both the rate-turn and crossover event
/// families are always populated; `alert_bullish`/`alert_bearish` select
/// one family according to the classifier mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrendBar {
    pub estimate: Option<f64>,
    pub secondary: Option<f64>,
    pub state: Option<TrendState>,
    pub turned_bullish: bool,
    pub turned_bearish: bool,
    pub bullish_cross: bool,
    pub bearish_cross: bool,
    pub alert_bullish: bool,
    pub alert_bearish: bool,
}

/// A held position. Quantity is in lots and strictly positive — a position
/// that reaches zero is removed, never retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub average_entry_price: Decimal,
}

impl Position {
    /// Unrealized P&L as a percentage of the average entry price.
    pub fn unrealized_pnl_percent(&self, current_price: Decimal) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.average_entry_price.is_zero() {
            return 0.0;
        }
        ((current_price - self.average_entry_price) / self.average_entry_price
            * Decimal::from(100))
        .to_f64()
        .unwrap_or(0.0)
    }
}

/// An entry paired with its protective orders. Ephemeral — constructed,
/// submitted, and discarded; the venue owns the lifecycle thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub entry_price: Decimal,
    pub quantity: i64,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOrderKind {
    TakeProfit,
    StopLoss,
}

/// Venue report for an executed market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFill {
    pub filled_price: Decimal,
    pub total_amount: Decimal,
}

/// Protective order submission parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrderRequest {
    pub venue_id: String,
    pub quantity: i64,
    pub trigger_price: Decimal,
    pub limit_price: Option<Decimal>,
    pub kind: StopOrderKind,
    pub expires_at: DateTime<Utc>,
}

/// Trading metadata reported by the venue for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    pub lot_size: i64,
    pub price_increment: Decimal,
}

/// One entry of the venue's tradable-instrument list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradableInstrument {
    pub symbol: String,
    pub venue_id: String,
    pub currency: String,
}

/// A live position as reported by the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuePosition {
    pub venue_id: String,
    pub quantity: i64,
    pub current_price: Decimal,
    pub unrealized_yield: f64,
}

/// Whether positions live in the in-memory paper ledger or at the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Sandbox,
    Live,
}

/// Screener request: which market, which indicator columns, which wire-level
/// filters, how to sort, and how many rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenQuery {
    pub market: String,
    pub columns: Vec<String>,
    pub filters: Vec<ScreenFilter>,
    pub sort: Option<ScreenSort>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenFilter {
    pub field: String,
    pub operation: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenSort {
    pub field: String,
    pub ascending: bool,
}
