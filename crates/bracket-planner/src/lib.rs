use engine_core::{BracketOrder, EngineError, EngineResult};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How the protective trigger prices are derived from the entry fill.
///
/// Fixed percentages truncate **down** to the price increment so a
/// protective order never lands inside the adverse zone; ATR offsets round
/// to the nearest increment. Stop-loss percentage is negative, as in
/// "−2% from entry".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketProfile {
    FixedPercent {
        take_profit_pct: Decimal,
        stop_loss_pct: Decimal,
    },
    AtrOffset {
        offset: Decimal,
    },
}

impl Default for BracketProfile {
    /// +5% take-profit, −2% stop-loss.
    fn default() -> Self {
        Self::FixedPercent {
            take_profit_pct: Decimal::new(5, 2),
            stop_loss_pct: Decimal::new(-2, 2),
        }
    }
}

/// Compute the take-profit and stop-loss trigger prices for a long entry.
///
/// Pure computation: submission to the venue, and the expiry of the
/// resulting stop orders, belong to the caller. Rejects non-positive
/// inputs, and rejects a bracket that no longer satisfies
/// `stop_loss < entry < take_profit` after increment rounding.
pub fn plan(
    entry_price: Decimal,
    quantity: i64,
    price_increment: Decimal,
    profile: &BracketProfile,
) -> EngineResult<BracketOrder> {
    if price_increment <= Decimal::ZERO {
        return Err(EngineError::InvalidOperation(format!(
            "price increment must be positive, got {price_increment}"
        )));
    }
    if quantity <= 0 {
        return Err(EngineError::InvalidOperation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if entry_price <= Decimal::ZERO {
        return Err(EngineError::InvalidOperation(format!(
            "entry price must be positive, got {entry_price}"
        )));
    }

    let (take_profit, stop_loss) = match profile {
        BracketProfile::AtrOffset { offset } => {
            if *offset <= Decimal::ZERO {
                return Err(EngineError::InvalidOperation(format!(
                    "ATR offset must be positive, got {offset}"
                )));
            }
            (
                round_to_increment(entry_price + offset, price_increment),
                round_to_increment(entry_price - offset, price_increment),
            )
        }
        BracketProfile::FixedPercent {
            take_profit_pct,
            stop_loss_pct,
        } => {
            if *take_profit_pct <= Decimal::ZERO {
                return Err(EngineError::InvalidOperation(format!(
                    "take-profit percentage must be positive, got {take_profit_pct}"
                )));
            }
            if *stop_loss_pct >= Decimal::ZERO {
                return Err(EngineError::InvalidOperation(format!(
                    "stop-loss percentage must be negative, got {stop_loss_pct}"
                )));
            }
            (
                truncate_to_increment(
                    entry_price * (Decimal::ONE + take_profit_pct),
                    price_increment,
                ),
                truncate_to_increment(
                    entry_price * (Decimal::ONE + stop_loss_pct),
                    price_increment,
                ),
            )
        }
    };

    if !(stop_loss < entry_price && entry_price < take_profit) {
        return Err(EngineError::InvalidOperation(format!(
            "bracket collapsed after rounding: stop {stop_loss} / entry {entry_price} / target {take_profit}"
        )));
    }

    Ok(BracketOrder {
        entry_price,
        quantity,
        take_profit,
        stop_loss,
    })
}

/// Truncate down to the nearest multiple of the increment.
fn truncate_to_increment(price: Decimal, increment: Decimal) -> Decimal {
    price - price % increment
}

/// Round to the nearest multiple of the increment.
fn round_to_increment(price: Decimal, increment: Decimal) -> Decimal {
    (price / increment).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        * increment
}
