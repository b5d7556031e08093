use async_trait::async_trait;

use crate::error::EngineResult;
use crate::types::{
    Bar, BarInterval, IndicatorRow, InstrumentMetadata, MarketFill, OrderDirection, ScreenQuery,
    StopOrderRequest, TradableInstrument, VenuePosition,
};

/// Market-data screening service: returns per-instrument indicator rows for
/// a query. A failed call means "no candidates this cycle" to the caller.
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    async fn scan(&self, query: &ScreenQuery) -> EngineResult<Vec<IndicatorRow>>;
}

/// Brokerage execution venue. All operations are synchronous
/// request/response; failures surface as `EngineError`, never a crash.
#[async_trait]
pub trait BrokerageVenue: Send + Sync {
    /// Full tradable-instrument list for a market.
    async fn list_tradable_instruments(
        &self,
        market: &str,
    ) -> EngineResult<Vec<TradableInstrument>>;

    /// Execute a market order; the venue reports the fill price.
    async fn place_market_order(
        &self,
        venue_id: &str,
        quantity: i64,
        direction: OrderDirection,
    ) -> EngineResult<MarketFill>;

    /// Submit a protective stop order (take-profit or stop-loss).
    async fn place_stop_order(&self, request: StopOrderRequest) -> EngineResult<()>;

    /// Lot size and price increment for an instrument.
    async fn get_instrument_metadata(&self, venue_id: &str) -> EngineResult<InstrumentMetadata>;

    /// Live positions as the venue reports them.
    async fn get_positions(&self) -> EngineResult<Vec<VenuePosition>>;

    /// Top-of-book size, in lots, for liquidity clamping.
    async fn get_top_of_book_size(&self, venue_id: &str) -> EngineResult<i64>;

    /// Recent price history for an instrument.
    async fn get_candles(
        &self,
        venue_id: &str,
        lookback_days: i64,
        interval: BarInterval,
    ) -> EngineResult<Vec<Bar>>;
}

/// External regression model: given a recent close history, estimate the
/// next close. The engine only consumes the capability; training and
/// inference live elsewhere.
#[async_trait]
pub trait ClosePredictor: Send + Sync {
    async fn predict_next_close(&self, symbol: &str, closes: &[f64]) -> EngineResult<f64>;
}
