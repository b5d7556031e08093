use bracket_planner::{plan, BracketProfile};
use chrono::{Duration, Utc};
use engine_core::{
    BracketOrder, EngineError, EngineResult, OrderDirection, StopOrderKind, StopOrderRequest,
    TradingMode,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::context::EngineContext;

/// Result of a completed entry. `bracket` is `None` when the protective
/// orders could not be planned after the fill — the position exists, the
/// caller decides what to do about the missing protection.
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub symbol: String,
    pub quantity: i64,
    pub fill_price: Decimal,
    pub spent: Decimal,
    pub bracket: Option<BracketOrder>,
}

#[derive(Debug, Clone)]
pub struct ExitOutcome {
    pub symbol: String,
    pub quantity: i64,
    pub fill_price: Decimal,
    pub proceeds: Decimal,
}

/// Size, submit, protect, and (in sandbox mode) record one long entry.
/// Returns `Ok(None)` when the amount affords no lot or the book is empty —
/// a no-fill, not an error.
pub async fn execute_entry(
    ctx: &EngineContext,
    symbol: &str,
    cash_amount: Decimal,
    reference_price: Decimal,
    atr_offset: Option<Decimal>,
) -> EngineResult<Option<EntryOutcome>> {
    if cash_amount <= Decimal::ZERO {
        return Err(EngineError::InvalidOperation(format!(
            "buy amount must be positive, got {cash_amount}"
        )));
    }
    if reference_price <= Decimal::ZERO {
        return Err(EngineError::InvalidOperation(format!(
            "reference price must be positive, got {reference_price}"
        )));
    }

    let venue_id = ctx.directory.resolve(symbol).await?;
    let metadata = ctx.venue.get_instrument_metadata(&venue_id).await?;
    let liquidity = ctx.venue.get_top_of_book_size(&venue_id).await?;

    // Size from the reference price; in sandbox the ledger balance caps the
    // spend so the paper account can never go negative.
    let spendable = match ctx.config.mode {
        TradingMode::Sandbox => cash_amount.min(ctx.ledger.lock().await.cash_balance()),
        TradingMode::Live => cash_amount,
    };
    let lot_cost = reference_price * Decimal::from(metadata.lot_size);
    let quantity = (spendable / lot_cost)
        .floor()
        .to_i64()
        .unwrap_or(0)
        .min(liquidity.max(0));
    if quantity == 0 {
        tracing::info!("{symbol}: no fill ({spendable} affords no lot at {lot_cost}, book size {liquidity})");
        return Ok(None);
    }

    let fill = ctx
        .venue
        .place_market_order(&venue_id, quantity, OrderDirection::Buy)
        .await?;
    tracing::info!(
        "entered {symbol}: {quantity} lots @ {} (total {})",
        fill.filled_price,
        fill.total_amount
    );

    if ctx.config.mode == TradingMode::Sandbox {
        let cost = fill.filled_price * Decimal::from(metadata.lot_size) * Decimal::from(quantity);
        let mut ledger = ctx.ledger.lock().await;
        let recorded = ledger.buy_for_amount(
            symbol,
            cost,
            fill.filled_price,
            metadata.lot_size,
            quantity,
        )?;
        if recorded < quantity {
            tracing::warn!(
                "{symbol}: ledger recorded {recorded} of {quantity} lots (fill price moved past the paper balance)"
            );
        }
    }

    let profile = match atr_offset {
        Some(offset) => BracketProfile::AtrOffset { offset },
        None => BracketProfile::FixedPercent {
            take_profit_pct: ctx.config.take_profit_pct,
            stop_loss_pct: ctx.config.stop_loss_pct,
        },
    };
    let bracket = match plan(fill.filled_price, quantity, metadata.price_increment, &profile) {
        Ok(bracket) => bracket,
        Err(e) => {
            tracing::warn!("{symbol}: position is unprotected, bracket planning failed: {e}");
            return Ok(Some(EntryOutcome {
                symbol: symbol.to_string(),
                quantity,
                fill_price: fill.filled_price,
                spent: fill.total_amount,
                bracket: None,
            }));
        }
    };

    let expires_at = Utc::now() + Duration::days(ctx.config.stop_expiry_days);
    ctx.venue
        .place_stop_order(StopOrderRequest {
            venue_id: venue_id.clone(),
            quantity,
            trigger_price: bracket.take_profit,
            limit_price: Some(bracket.take_profit),
            kind: StopOrderKind::TakeProfit,
            expires_at,
        })
        .await?;
    ctx.venue
        .place_stop_order(StopOrderRequest {
            venue_id,
            quantity,
            trigger_price: bracket.stop_loss,
            limit_price: None,
            kind: StopOrderKind::StopLoss,
            expires_at,
        })
        .await?;

    Ok(Some(EntryOutcome {
        symbol: symbol.to_string(),
        quantity,
        fill_price: fill.filled_price,
        spent: fill.total_amount,
        bracket: Some(bracket),
    }))
}

/// Close (part of) a position at market. In sandbox mode the held quantity
/// is validated before anything is submitted, so an oversell mutates
/// nothing anywhere.
pub async fn execute_exit(
    ctx: &EngineContext,
    symbol: &str,
    quantity: i64,
) -> EngineResult<ExitOutcome> {
    if quantity <= 0 {
        return Err(EngineError::InvalidOperation(format!(
            "sell quantity must be positive, got {quantity}"
        )));
    }

    let venue_id = ctx.directory.resolve(symbol).await?;
    let metadata = ctx.venue.get_instrument_metadata(&venue_id).await?;

    if ctx.config.mode == TradingMode::Sandbox {
        let ledger = ctx.ledger.lock().await;
        let held = ledger
            .position(symbol)
            .map(|p| p.quantity)
            .ok_or_else(|| EngineError::InvalidOperation(format!("no position in {symbol}")))?;
        if quantity > held {
            return Err(EngineError::InvalidOperation(format!(
                "sell quantity {quantity} exceeds held {held} for {symbol}"
            )));
        }
    }

    let fill = ctx
        .venue
        .place_market_order(&venue_id, quantity, OrderDirection::Sell)
        .await?;

    let proceeds = if ctx.config.mode == TradingMode::Sandbox {
        ctx.ledger
            .lock()
            .await
            .sell_now(symbol, quantity, fill.filled_price, metadata.lot_size)?
    } else {
        fill.total_amount
    };

    tracing::info!("exited {symbol}: {quantity} lots @ {} (proceeds {proceeds})", fill.filled_price);
    Ok(ExitOutcome {
        symbol: symbol.to_string(),
        quantity,
        fill_price: fill.filled_price,
        proceeds,
    })
}
