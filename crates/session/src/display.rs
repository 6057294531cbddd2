//! What the display sink renders after each command

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Balance, Order, OrderId, Position, Price, Quantity, Symbol};
use tiller_position_manager::{PositionSummary, Table};
use tiller_risk_manager::PositionRisk;

/// Data sources that can go stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feed {
    Positions,
    Balances,
    Prices,
    Orders,
}

impl From<Table> for Feed {
    fn from(table: Table) -> Self {
        match table {
            Table::Positions => Feed::Positions,
            Table::Balances => Feed::Balances,
            Table::Prices => Feed::Prices,
        }
    }
}

/// `true` where the latest refresh failed and older data is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleFlags {
    pub positions: bool,
    pub balances: bool,
    pub prices: bool,
    pub orders: bool,
}

impl StaleFlags {
    pub fn any(&self) -> bool {
        self.positions || self.balances || self.prices || self.orders
    }
}

/// Result of the last successful command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Placed(Order),
    Tiered {
        placed: Vec<OrderId>,
        /// One line per failed tier
        failures: Vec<String>,
    },
    Cancelled(Vec<OrderId>),
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub symbol: Symbol,
    pub positions: Vec<Position>,
    pub balances: Vec<Balance>,
    /// Non-terminal orders, oldest first
    pub open_orders: Vec<Order>,
    pub last_prices: BTreeMap<Symbol, Price>,
    pub warnings: Vec<String>,
    pub stale: StaleFlags,
    pub summary: PositionSummary,
    /// Per open position, same order as `positions`
    pub position_risks: Vec<PositionRisk>,
    pub portfolio_value: Decimal,
    /// Largest order size the risk limits allow at the current price
    pub max_quantity: Option<Quantity>,
    pub last_outcome: Option<CommandOutcome>,
}

impl DisplayState {
    pub fn current_price(&self) -> Option<Price> {
        self.last_prices.get(&self.symbol).copied()
    }

    pub fn position(&self) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == self.symbol)
    }

    /// Margin held against all open positions
    pub fn total_margin(&self) -> Decimal {
        self.summary.total_margin
    }

    pub fn position_risk(&self) -> Option<&PositionRisk> {
        self.position_risks.iter().find(|r| r.symbol == self.symbol)
    }
}
