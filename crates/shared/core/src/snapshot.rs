//! Copy-on-read account view
//!
//! The risk check and the submission that follows it both read from one
//! `AccountSnapshot`, so a background refresh landing in between cannot
//! change the inputs of a decision that is already in progress.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{Balance, Position, Side};
use crate::values::{Price, Quantity, Symbol, Timestamp};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub positions: HashMap<Symbol, Position>,
    pub balances: HashMap<String, Balance>,
    /// Last known market price per symbol
    pub prices: HashMap<Symbol, Price>,
    pub taken_at: Option<Timestamp>,
    /// True if any table in this snapshot is older than the last refresh attempt
    pub stale: bool,
}

impl AccountSnapshot {
    /// Signed position quantity; zero when no position is held
    pub fn position_quantity(&self, symbol: &Symbol) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Available (unlocked) amount of an asset; zero when unknown
    pub fn available(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.available())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn price(&self, symbol: &Symbol) -> Option<Price> {
        self.prices.get(symbol).copied()
    }

    /// Price of one unit of `asset` in `quote_asset`
    fn asset_price(&self, asset: &str, quote_asset: &str) -> Option<Price> {
        if asset.eq_ignore_ascii_case(quote_asset) {
            return Some(Decimal::ONE);
        }
        let symbol = Symbol::from_assets(asset, quote_asset).ok()?;
        self.price(&symbol)
    }

    /// Sum of every balance's total valued in `quote_asset`.
    ///
    /// Assets without a known price are left out; see [`Self::unpriced_assets`].
    /// Saturates at `Decimal::MAX` rather than overflowing.
    pub fn portfolio_value(&self, quote_asset: &str) -> Decimal {
        self.balances
            .values()
            .filter_map(|b| {
                self.asset_price(b.asset(), quote_asset)
                    .map(|price| b.total().saturating_mul(price))
            })
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Non-zero balances that could not be valued in `quote_asset`
    pub fn unpriced_assets(&self, quote_asset: &str) -> Vec<String> {
        let mut assets: Vec<String> = self
            .balances
            .values()
            .filter(|b| !b.total().is_zero())
            .filter(|b| self.asset_price(b.asset(), quote_asset).is_none())
            .map(|b| b.asset().to_string())
            .collect();
        assets.sort();
        assets
    }

    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Count an accepted order against this copy as if it will fill: the
    /// funds it spends move from available to locked and the position is
    /// projected by its quantity. Used to check a batch of orders in turn.
    pub fn reserve_order(&mut self, symbol: &Symbol, side: Side, quantity: Quantity, price: Price) {
        let (asset, amount) = match side {
            Side::Buy => (symbol.quote(), quantity.saturating_mul(price)),
            Side::Sell => (symbol.base(), quantity),
        };
        if let Some(balance) = self.balances.get(asset) {
            let moved = amount.min(balance.available());
            if let Ok(reserved) = Balance::new(
                asset,
                balance.available() - moved,
                balance.locked() + moved,
                balance.staked(),
            ) {
                self.balances.insert(asset.to_string(), reserved);
            }
        }

        let signed = side.sign() * quantity;
        let projected = match self.positions.get(symbol) {
            Some(p) => Position::new(
                symbol.clone(),
                p.quantity.saturating_add(signed),
                p.entry_price,
                p.mark_price,
            )
            .with_margin(p.margin, p.liquidation_price),
            None => Position::new(symbol.clone(), signed, price, price),
        };
        self.positions.insert(symbol.clone(), projected);
    }
}
