use std::sync::Arc;

use engine_core::{
    BarInterval, BrokerageVenue, ClosePredictor, EngineResult, PriceSeries, ScreeningProvider,
};
use instrument_directory::InstrumentDirectory;
use paper_ledger::PaperLedger;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::strategy::Strategy;

/// Everything both loops and the command surface share, built once at
/// startup. The ledger sits behind a single mutex so buys and sells from
/// either loop interleave through atomic operations only.
pub struct EngineContext {
    pub config: EngineConfig,
    pub screener: Arc<dyn ScreeningProvider>,
    pub venue: Arc<dyn BrokerageVenue>,
    pub predictor: Option<Arc<dyn ClosePredictor>>,
    pub directory: InstrumentDirectory,
    pub ledger: Mutex<PaperLedger>,
    pub strategy: Strategy,
}

impl EngineContext {
    /// Daily close history for a symbol: resolved through the directory,
    /// pulled from the venue, validated and bounded through a
    /// [`PriceSeries`] before the classifier ever sees it.
    pub async fn close_history(&self, symbol: &str) -> EngineResult<Vec<f64>> {
        let venue_id = self.directory.resolve(symbol).await?;
        let bars = self
            .venue
            .get_candles(&venue_id, self.config.history_lookback_days, BarInterval::Day)
            .await?;
        let series = PriceSeries::from_bars(self.config.history_lookback_days, bars)?;
        Ok(series.closes())
    }
}
