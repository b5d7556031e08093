use engine_core::{EngineResult, TradingMode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::context::EngineContext;
use crate::strategy::ExitDecision;
use crate::trade_executor::{execute_exit, ExitOutcome};

struct Holding {
    symbol: String,
    quantity: i64,
    pnl_percent: f64,
    closes: Vec<f64>,
}

/// One exit-monitor pass over the currently held positions. Per-position
/// failures are logged and skipped; an empty book is a no-op.
pub async fn run_exit_cycle(ctx: &EngineContext) -> EngineResult<Vec<ExitOutcome>> {
    let mut exits = Vec::new();

    for holding in holdings(ctx).await? {
        match ctx.strategy.check_exit(
            &holding.closes,
            holding.pnl_percent,
            ctx.config.exit_pnl_floor_pct,
        ) {
            ExitDecision::Hold => {}
            ExitDecision::Exit(reason) => {
                tracing::info!("closing {}: {reason}", holding.symbol);
                match execute_exit(ctx, &holding.symbol, holding.quantity).await {
                    Ok(outcome) => exits.push(outcome),
                    Err(e) => tracing::error!("failed to close {}: {e}", holding.symbol),
                }
            }
        }
    }

    Ok(exits)
}

async fn holdings(ctx: &EngineContext) -> EngineResult<Vec<Holding>> {
    let mut holdings = Vec::new();

    match ctx.config.mode {
        TradingMode::Sandbox => {
            let positions = ctx.ledger.lock().await.positions();
            for position in positions {
                match ctx.close_history(&position.symbol).await {
                    Ok(closes) => {
                        let pnl_percent = closes
                            .last()
                            .and_then(|c| Decimal::from_f64(*c))
                            .map(|current| position.unrealized_pnl_percent(current))
                            .unwrap_or(0.0);
                        holdings.push(Holding {
                            symbol: position.symbol,
                            quantity: position.quantity,
                            pnl_percent,
                            closes,
                        });
                    }
                    Err(e) => tracing::warn!("{}: exit check skipped: {e}", position.symbol),
                }
            }
        }
        TradingMode::Live => {
            for position in ctx.venue.get_positions().await? {
                let symbol = match ctx.directory.reverse_resolve(&position.venue_id).await {
                    Ok(symbol) => symbol,
                    Err(e) => {
                        tracing::warn!("venue position not in directory, skipped: {e}");
                        continue;
                    }
                };
                match ctx.close_history(&symbol).await {
                    Ok(closes) => holdings.push(Holding {
                        symbol,
                        quantity: position.quantity,
                        pnl_percent: position.unrealized_yield,
                        closes,
                    }),
                    Err(e) => tracing::warn!("{symbol}: exit check skipped: {e}"),
                }
            }
        }
    }

    Ok(holdings)
}
