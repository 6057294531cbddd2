use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity, Symbol};

/// Position in one symbol as last reported by the exchange
///
/// `quantity` is signed: positive = long, negative = short, zero = flat.
/// A flat position is kept for display until the next refresh replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub entry_price: Price,
    pub mark_price: Price,
    /// Always `quantity * (mark_price - entry_price)`
    pub unrealized_pnl: Decimal,
    /// Collateral the exchange holds against the position; zero on spot
    #[serde(default)]
    pub margin: Decimal,
    #[serde(default)]
    pub liquidation_price: Option<Price>,
}

impl Position {
    pub fn new(symbol: Symbol, quantity: Quantity, entry_price: Price, mark_price: Price) -> Self {
        Self {
            symbol,
            quantity,
            entry_price,
            mark_price,
            unrealized_pnl: Self::pnl_at(quantity, entry_price, mark_price),
            margin: Decimal::ZERO,
            liquidation_price: None,
        }
    }

    /// Attach margin details; a non-positive liquidation price means none
    pub fn with_margin(mut self, margin: Decimal, liquidation_price: Option<Price>) -> Self {
        self.margin = margin;
        self.liquidation_price = liquidation_price.filter(|p| *p > Decimal::ZERO);
        self
    }

    /// `quantity * (mark - entry)`; the sign of quantity handles shorts.
    /// Saturates at the decimal range.
    pub fn pnl_at(quantity: Quantity, entry_price: Price, mark_price: Price) -> Decimal {
        quantity.saturating_mul(mark_price.saturating_sub(entry_price))
    }

    /// Update mark price and recalculate PnL
    pub fn set_mark_price(&mut self, mark_price: Price) {
        self.mark_price = mark_price;
        self.unrealized_pnl = Self::pnl_at(self.quantity, self.entry_price, mark_price);
    }

    /// Absolute exposure at the mark price, in quote currency
    pub fn notional(&self) -> Decimal {
        self.quantity.abs().saturating_mul(self.mark_price)
    }

    /// Move from entry to mark in percent, signed in the position's favour
    pub fn pnl_percentage(&self) -> Decimal {
        if self.entry_price.is_zero() || self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        let raw = percent_of(self.mark_price.saturating_sub(self.entry_price), self.entry_price);
        if self.is_short() { -raw } else { raw }
    }

    /// Distance from mark to liquidation in percent of mark, positive while
    /// the position is safe. `None` without a liquidation price.
    pub fn liquidation_distance(&self) -> Option<Decimal> {
        let liquidation = self.liquidation_price?;
        if self.mark_price.is_zero() || self.is_flat() {
            return None;
        }
        let gap = if self.is_long() {
            self.mark_price - liquidation
        } else {
            liquidation - self.mark_price
        };
        Some(percent_of(gap, self.mark_price))
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// `part / whole * 100`, saturating; `whole` is non-zero
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    match part.checked_div(whole) {
        Some(ratio) => ratio.saturating_mul(Decimal::ONE_HUNDRED),
        None if part.is_sign_negative() != whole.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}
