use std::sync::Arc;

use engine_core::{
    EngineError, EngineResult, Position, RankedCandidate, TradingMode, TrendBar,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::context::EngineContext;
use crate::scanner::screen_query;
use crate::trade_executor::{execute_entry, execute_exit, EntryOutcome, ExitOutcome};

/// A position annotated for display by whatever front end consumes us.
#[derive(Debug, Clone)]
pub struct PositionReport {
    pub position: Position,
    pub current_price: Decimal,
    pub unrealized_pnl_percent: f64,
}

/// Callable entry points for an external chat or CLI front end. Every
/// method returns a descriptive failure instead of raising past the
/// boundary; rendering is the caller's business.
#[derive(Clone)]
pub struct EngineHandle {
    ctx: Arc<EngineContext>,
}

impl EngineHandle {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Current ranked candidates from a fresh screener snapshot.
    pub async fn get_candidates(&self) -> EngineResult<Vec<RankedCandidate>> {
        let snapshot = self
            .ctx
            .screener
            .scan(&screen_query(&self.ctx.config))
            .await?;
        Ok(self.ctx.strategy.candidates(&snapshot))
    }

    /// Latest trend state for a symbol.
    pub async fn get_signal(&self, symbol: &str) -> EngineResult<TrendBar> {
        let closes = self.ctx.close_history(symbol).await?;
        self.ctx.strategy.signal(&closes).ok_or_else(|| {
            EngineError::DataUnavailable(format!("not enough history for a {symbol} signal"))
        })
    }

    /// Buy `cash_amount` worth of a symbol at market, with protective
    /// brackets.
    pub async fn buy(&self, symbol: &str, cash_amount: Decimal) -> EngineResult<EntryOutcome> {
        let closes = self.ctx.close_history(symbol).await?;
        let last_close = closes
            .last()
            .and_then(|c| Decimal::from_f64(*c))
            .ok_or_else(|| {
                EngineError::DataUnavailable(format!("no reference price for {symbol}"))
            })?;

        execute_entry(&self.ctx, symbol, cash_amount, last_close, None)
            .await?
            .ok_or_else(|| {
                EngineError::InvalidOperation(format!(
                    "{cash_amount} affords no lot of {symbol} (or the book is empty)"
                ))
            })
    }

    /// Sell `quantity` lots of a held symbol at market.
    pub async fn sell(&self, symbol: &str, quantity: i64) -> EngineResult<ExitOutcome> {
        execute_exit(&self.ctx, symbol, quantity).await
    }

    /// Open positions with unrealized P&L, from the paper ledger in sandbox
    /// mode or from the venue in live mode.
    pub async fn list_positions(&self) -> EngineResult<Vec<PositionReport>> {
        match self.ctx.config.mode {
            TradingMode::Sandbox => {
                let positions = self.ctx.ledger.lock().await.positions();
                let mut reports = Vec::with_capacity(positions.len());
                for position in positions {
                    let current_price = self
                        .ctx
                        .close_history(&position.symbol)
                        .await
                        .ok()
                        .and_then(|closes| closes.last().and_then(|c| Decimal::from_f64(*c)))
                        .unwrap_or(position.average_entry_price);
                    let unrealized_pnl_percent = position.unrealized_pnl_percent(current_price);
                    reports.push(PositionReport {
                        position,
                        current_price,
                        unrealized_pnl_percent,
                    });
                }
                Ok(reports)
            }
            TradingMode::Live => {
                let mut reports = Vec::new();
                for venue_position in self.ctx.venue.get_positions().await? {
                    let symbol = match self
                        .ctx
                        .directory
                        .reverse_resolve(&venue_position.venue_id)
                        .await
                    {
                        Ok(symbol) => symbol,
                        Err(e) => {
                            tracing::debug!("venue position not in directory: {e}");
                            continue;
                        }
                    };
                    reports.push(PositionReport {
                        position: Position {
                            symbol,
                            quantity: venue_position.quantity,
                            average_entry_price: venue_position.current_price,
                        },
                        current_price: venue_position.current_price,
                        unrealized_pnl_percent: venue_position.unrealized_yield,
                    });
                }
                Ok(reports)
            }
        }
    }

}
