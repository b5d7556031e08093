use std::collections::HashMap;

use engine_core::{EngineError, EngineResult, Position};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// In-memory sandbox ledger: cash plus one weighted-average position per
/// symbol. Created with a configured starting capital, mutated only by
/// buy/sell, never persisted — it resets each process start.
///
/// A partial sell leaves the average entry price unchanged; per-lot FIFO
/// cost basis is intentionally not tracked.
#[derive(Debug, Clone)]
pub struct PaperLedger {
    cash_balance: Decimal,
    positions: HashMap<String, Position>,
}

impl PaperLedger {
    pub fn new(starting_capital: Decimal) -> EngineResult<Self> {
        if starting_capital < Decimal::ZERO {
            return Err(EngineError::InvalidOperation(format!(
                "starting capital must not be negative, got {starting_capital}"
            )));
        }
        Ok(Self {
            cash_balance: starting_capital,
            positions: HashMap::new(),
        })
    }

    pub fn cash_balance(&self) -> Decimal {
        self.cash_balance
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// All open positions, ordered by symbol.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    /// Buy as many lots as `cash_amount` affords at `unit_price`, clamped to
    /// the spendable balance and to `available_liquidity` (top-of-book
    /// size). Returns the filled quantity; zero means no fill and no
    /// mutation. The cash balance can never go negative.
    pub fn buy_for_amount(
        &mut self,
        symbol: &str,
        cash_amount: Decimal,
        unit_price: Decimal,
        lot_size: i64,
        available_liquidity: i64,
    ) -> EngineResult<i64> {
        if unit_price <= Decimal::ZERO {
            return Err(EngineError::InvalidOperation(format!(
                "unit price must be positive, got {unit_price}"
            )));
        }
        if lot_size < 1 {
            return Err(EngineError::InvalidOperation(format!(
                "lot size must be at least 1, got {lot_size}"
            )));
        }
        if cash_amount < Decimal::ZERO {
            return Err(EngineError::InvalidOperation(format!(
                "cash amount must not be negative, got {cash_amount}"
            )));
        }

        let lot_cost = unit_price * Decimal::from(lot_size);
        let spendable = cash_amount.min(self.cash_balance);
        let affordable = (spendable / lot_cost).floor().to_i64().unwrap_or(0);
        let quantity = affordable.min(available_liquidity.max(0));

        if quantity == 0 {
            tracing::debug!("no fill for {symbol}: {spendable} affords no lot at {lot_cost}");
            return Ok(0);
        }

        let cost = lot_cost * Decimal::from(quantity);
        // Clamping above makes this unreachable; keep the invariant checked.
        if cost > self.cash_balance {
            return Err(EngineError::InvalidOperation(format!(
                "cost {cost} exceeds cash balance {}",
                self.cash_balance
            )));
        }

        self.cash_balance -= cost;
        match self.positions.get_mut(symbol) {
            Some(position) => {
                let held = Decimal::from(position.quantity);
                let added = Decimal::from(quantity);
                position.average_entry_price = (position.average_entry_price * held
                    + unit_price * added)
                    / (held + added);
                position.quantity += quantity;
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        quantity,
                        average_entry_price: unit_price,
                    },
                );
            }
        }

        tracing::info!("ledger buy: {quantity} x {symbol} @ {unit_price}, cash {}", self.cash_balance);
        Ok(quantity)
    }

    /// Sell `quantity` lots at `unit_price` and credit the proceeds.
    /// Selling more than held, or a symbol not held, is an error — nothing
    /// is mutated. A position that reaches zero is removed.
    pub fn sell_now(
        &mut self,
        symbol: &str,
        quantity: i64,
        unit_price: Decimal,
        lot_size: i64,
    ) -> EngineResult<Decimal> {
        if quantity <= 0 {
            return Err(EngineError::InvalidOperation(format!(
                "sell quantity must be positive, got {quantity}"
            )));
        }
        if unit_price <= Decimal::ZERO {
            return Err(EngineError::InvalidOperation(format!(
                "unit price must be positive, got {unit_price}"
            )));
        }
        if lot_size < 1 {
            return Err(EngineError::InvalidOperation(format!(
                "lot size must be at least 1, got {lot_size}"
            )));
        }

        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| EngineError::InvalidOperation(format!("no position in {symbol}")))?;
        if quantity > position.quantity {
            return Err(EngineError::InvalidOperation(format!(
                "sell quantity {quantity} exceeds held {} for {symbol}",
                position.quantity
            )));
        }

        let proceeds = unit_price * Decimal::from(lot_size) * Decimal::from(quantity);
        position.quantity -= quantity;
        if position.quantity == 0 {
            self.positions.remove(symbol);
        }
        self.cash_balance += proceeds;

        tracing::info!("ledger sell: {quantity} x {symbol} @ {unit_price}, cash {}", self.cash_balance);
        Ok(proceeds)
    }
}
