//! Position Manager
//!
//! Keeps the position, balance and price tables and refreshes them from the
//! gateway. Table locks are taken only after the gateway call returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_clock::Clock;
use tiller_core::{AccountSnapshot, Balance, Position, Price, Symbol, Timestamp};
use tiller_gateway::{ExchangeGateway, GatewayError, with_deadline};

use crate::error::{Result, StaleData, Table};
use crate::pnl::PositionSummary;

/// When a table was last replaced and whether the latest attempt failed
#[derive(Debug, Clone, Copy, Default)]
struct Freshness {
    refreshed_at: Option<Timestamp>,
    stale: bool,
}

#[derive(Debug, Default)]
struct Tracked<T> {
    rows: T,
    freshness: Freshness,
    /// When the request behind the current rows was issued
    as_of: Option<Timestamp>,
}

impl<T> Tracked<T> {
    /// Replace the rows with a report requested at `issued_at`. A report
    /// requested before the current rows' request is older data and is
    /// dropped; returns whether the rows were replaced.
    fn replace(&mut self, rows: T, issued_at: Timestamp, at: Timestamp) -> bool {
        if self.as_of.is_some_and(|current| issued_at < current) {
            return false;
        }
        self.rows = rows;
        self.as_of = Some(issued_at);
        self.freshness = Freshness {
            refreshed_at: Some(at),
            stale: false,
        };
        true
    }
}

/// Per-table staleness flags for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staleness {
    pub positions: bool,
    pub balances: bool,
    pub prices: bool,
}

impl Staleness {
    pub fn any(&self) -> bool {
        self.positions || self.balances || self.prices
    }
}

pub struct PositionManager {
    gateway: Arc<dyn ExchangeGateway>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    positions: RwLock<Tracked<HashMap<Symbol, Position>>>,
    balances: RwLock<Tracked<HashMap<String, Balance>>>,
    prices: DashMap<Symbol, Price>,
    prices_freshness: RwLock<Freshness>,
}

impl PositionManager {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            gateway,
            clock,
            timeout,
            positions: RwLock::new(Tracked::default()),
            balances: RwLock::new(Tracked::default()),
            prices: DashMap::new(),
            prices_freshness: RwLock::new(Freshness::default()),
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Replace the position table with the exchange's report.
    ///
    /// A symbol missing from the report is closed and dropped. On failure the
    /// previous table is kept and flagged stale. A report that lands after a
    /// later-issued one is dropped.
    pub async fn refresh_positions(&self) -> Result<usize> {
        let issued_at = self.clock.now();
        let remote = match with_deadline(self.timeout, self.gateway.get_positions()).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.mark_stale(Table::Positions, &e)),
        };

        let rows: HashMap<Symbol, Position> = remote
            .into_iter()
            .map(|r| {
                let fallback = self.price(&r.symbol);
                let position = r.into_position(fallback);
                (position.symbol.clone(), position)
            })
            .collect();
        let mut table = self.positions.write();
        if !table.replace(rows, issued_at, self.clock.now()) {
            debug!("[POSITION] positions report from {} superseded, dropped", issued_at);
            return Ok(table.rows.len());
        }
        debug!("[POSITION] refreshed {} positions", table.rows.len());
        Ok(table.rows.len())
    }

    /// Replace the balance table with the exchange's report.
    ///
    /// A report with any invalid (negative) balance is discarded as a whole.
    pub async fn refresh_balances(&self) -> Result<usize> {
        let issued_at = self.clock.now();
        let remote = match with_deadline(self.timeout, self.gateway.get_balances()).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.mark_stale(Table::Balances, &e)),
        };

        let mut rows = HashMap::with_capacity(remote.len());
        for r in remote {
            match Balance::try_from(r) {
                Ok(balance) => {
                    rows.insert(balance.asset().to_string(), balance);
                }
                Err(e) => {
                    self.balances.write().freshness.stale = true;
                    warn!("[REFRESH] balances: discarding report: {}", e);
                    return Err(StaleData::new(
                        Table::Balances,
                        format!("invalid balance report: {}", e),
                    ));
                }
            }
        }
        let mut table = self.balances.write();
        if !table.replace(rows, issued_at, self.clock.now()) {
            debug!("[POSITION] balances report from {} superseded, dropped", issued_at);
            return Ok(table.rows.len());
        }
        debug!("[POSITION] refreshed {} balances", table.rows.len());
        Ok(table.rows.len())
    }

    /// Fetch market prices for `symbols` and re-mark positions.
    ///
    /// Every symbol is attempted; prices that did arrive are applied even
    /// when another symbol fails. The first failure is returned.
    pub async fn refresh_prices(&self, symbols: &[Symbol]) -> Result<usize> {
        let mut updated = 0;
        let mut first_error: Option<GatewayError> = None;

        for symbol in symbols {
            match with_deadline(self.timeout, self.gateway.get_market_price(symbol)).await {
                Ok(price) => {
                    self.update_mark_price(symbol, price);
                    updated += 1;
                }
                Err(e) => {
                    debug!("[REFRESH] price for {} failed: {}", symbol, e.sanitized());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(self.mark_stale(Table::Prices, &e)),
            None => {
                *self.prices_freshness.write() = Freshness {
                    refreshed_at: Some(self.clock.now()),
                    stale: false,
                };
                Ok(updated)
            }
        }
    }

    /// Record a price from an external feed and re-mark that symbol's position
    pub fn update_mark_price(&self, symbol: &Symbol, price: Price) {
        self.prices.insert(symbol.clone(), price);
        if let Some(position) = self.positions.write().rows.get_mut(symbol) {
            position.set_mark_price(price);
        }
    }

    fn mark_stale(&self, table: Table, error: &GatewayError) -> StaleData {
        match table {
            Table::Positions => self.positions.write().freshness.stale = true,
            Table::Balances => self.balances.write().freshness.stale = true,
            Table::Prices => self.prices_freshness.write().stale = true,
        }
        let cause = error.sanitized();
        warn!("[REFRESH] {} refresh failed, keeping previous snapshot: {}", table, cause);
        StaleData::new(table, cause)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Copy of every table, taken one table at a time
    pub fn snapshot(&self) -> AccountSnapshot {
        let staleness = self.staleness();
        let positions = self.positions.read().rows.clone();
        let balances = self.balances.read().rows.clone();

        AccountSnapshot {
            positions,
            balances,
            prices: self.last_prices(),
            taken_at: Some(self.clock.now()),
            stale: staleness.any(),
        }
    }

    /// Positions sorted by symbol
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.read().rows.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
        positions
    }

    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.positions.read().rows.get(symbol).cloned()
    }

    /// Balances sorted by asset
    pub fn balances(&self) -> Vec<Balance> {
        let mut balances: Vec<Balance> = self.balances.read().rows.values().cloned().collect();
        balances.sort_by(|a, b| a.asset().cmp(b.asset()));
        balances
    }

    pub fn balance(&self, asset: &str) -> Option<Balance> {
        self.balances.read().rows.get(asset).cloned()
    }

    pub fn price(&self, symbol: &Symbol) -> Option<Price> {
        self.prices.get(symbol).map(|p| *p)
    }

    pub fn last_prices(&self) -> HashMap<Symbol, Price> {
        self.prices
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn staleness(&self) -> Staleness {
        Staleness {
            positions: self.positions.read().freshness.stale,
            balances: self.balances.read().freshness.stale,
            prices: self.prices_freshness.read().stale,
        }
    }

    /// Time of the last successful refresh of `table`
    pub fn refreshed_at(&self, table: Table) -> Option<Timestamp> {
        match table {
            Table::Positions => self.positions.read().freshness.refreshed_at,
            Table::Balances => self.balances.read().freshness.refreshed_at,
            Table::Prices => self.prices_freshness.read().refreshed_at,
        }
    }

    /// Total of all balances valued in `quote_asset`; unpriced assets are
    /// skipped and logged
    pub fn portfolio_value(&self, quote_asset: &str) -> Decimal {
        let snapshot = self.snapshot();
        let unpriced = snapshot.unpriced_assets(quote_asset);
        if !unpriced.is_empty() {
            info!(
                "[POSITION] no {} price for {:?}, left out of portfolio value",
                quote_asset, unpriced
            );
        }
        snapshot.portfolio_value(quote_asset)
    }

    pub fn summary(&self) -> PositionSummary {
        PositionSummary::from_positions(self.positions.read().rows.values())
    }

    /// Margin held against all open positions
    pub fn total_margin(&self) -> Decimal {
        self.positions
            .read()
            .rows
            .values()
            .filter(|p| !p.is_flat())
            .fold(Decimal::ZERO, |total, p| total.saturating_add(p.margin))
    }
}
