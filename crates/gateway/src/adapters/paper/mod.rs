//! Paper exchange adapter
//!
//! In-memory exchange for paper trading and deterministic tests:
//! - Market orders fill at the current price per [`MarketFillPolicy`]
//! - Limit orders lock funds and rest until [`PaperExchange::fill_order`]
//! - Balances and (optionally) positions follow fills
//! - Faults and latency can be injected per operation
//!
//! Limit orders are not matched against the market price; this is an
//! account simulator, not a matching engine.

mod state;

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tiller_core::{Price, Quantity, Symbol};

use crate::error::GatewayError;
use crate::exchange::ExchangeGateway;
use crate::messages::account::{RemoteBalance, RemotePosition};
use crate::messages::market::MarketPrecision;
use crate::messages::order::{OrderAck, OrderRequest, RemoteOrder};
use state::PaperState;

/// Operations of the gateway port, used to target injected faults and latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    PlaceOrder,
    CancelOrder,
    CancelRange,
    CancelAll,
    OpenOrders,
    OrderStatus,
    Positions,
    Balances,
    MarketPrice,
    MarketPrecision,
}

/// How market orders fill at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketFillPolicy {
    /// Entire quantity fills immediately
    Full,
    /// This fraction of the quantity fills; the remainder stays open
    Partial(Decimal),
    /// Nothing fills yet; the order is listed as open
    Resting,
}

/// In-memory exchange implementing [`ExchangeGateway`]
pub struct PaperExchange {
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
        }
    }

    // Builder-style setup

    pub fn with_price(self, symbol: &Symbol, price: Price) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_balance(self, asset: &str, available: Decimal) -> Self {
        self.set_balance(asset, available, Decimal::ZERO, Decimal::ZERO);
        self
    }

    /// Tick and step size for `symbol`; unset markets report two price and
    /// six quantity decimals
    pub fn with_precision(self, symbol: &Symbol, tick_size: Price, step_size: Quantity) -> Self {
        self.state
            .lock()
            .precisions
            .insert(symbol.clone(), MarketPrecision::new(tick_size, step_size));
        self
    }

    pub fn with_market_fill(self, policy: MarketFillPolicy) -> Self {
        self.state.lock().market_fill = policy;
        self
    }

    /// List terminal orders (with their status) alongside open ones
    pub fn with_closed_orders_reported(self, report: bool) -> Self {
        self.state.lock().report_closed_orders = report;
        self
    }

    /// Derive positions from fills (default on)
    pub fn with_position_tracking(self, track: bool) -> Self {
        self.state.lock().track_positions = track;
        self
    }

    // Runtime controls

    pub fn set_price(&self, symbol: &Symbol, price: Price) {
        self.state.lock().prices.insert(symbol.clone(), price);
    }

    pub fn set_balance(&self, asset: &str, available: Decimal, locked: Decimal, staked: Decimal) {
        self.state.lock().set_balance(asset, available, locked, staked);
    }

    pub fn set_position(&self, symbol: &Symbol, quantity: Quantity, entry_price: Price) {
        self.state.lock().set_position(symbol, quantity, entry_price);
    }

    /// Margin and liquidation price reported with an open position
    pub fn set_position_margin(&self, symbol: &Symbol, margin: Decimal, liquidation_price: Option<Price>) {
        self.state
            .lock()
            .set_position_margin(symbol, margin, liquidation_price);
    }

    pub fn clear_position(&self, symbol: &Symbol) {
        self.state.lock().positions.remove(symbol);
    }

    /// Fill `quantity` more of a resting order at its limit price (or the
    /// market price for market orders)
    pub fn fill_order(&self, exchange_order_id: &str, quantity: Quantity) -> Result<(), GatewayError> {
        self.state.lock().fill_resting(exchange_order_id, quantity)
    }

    /// Remove an order from the exchange's books without a trace, as if it
    /// aged out of the exchange's reporting window
    pub fn forget_order(&self, exchange_order_id: &str) {
        self.state.lock().orders.remove(exchange_order_id);
    }

    /// Fail the next call of `op` with `error`; queued faults fire in order
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Delay every call of `op` by `latency`. The exchange acts on the
    /// request before the delay, so a caller that gives up still leaves the
    /// effect behind.
    pub fn set_latency(&self, op: GatewayOp, latency: Duration) {
        self.state.lock().latency.insert(op, latency);
    }

    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn order(&self, exchange_order_id: &str) -> Option<RemoteOrder> {
        self.state.lock().orders.get(exchange_order_id).cloned()
    }

    pub fn orders(&self) -> Vec<RemoteOrder> {
        self.state.lock().orders.values().cloned().collect()
    }

    pub fn balance(&self, asset: &str) -> Option<RemoteBalance> {
        self.state.lock().remote_balance(asset)
    }

    /// Run one operation: count it, pick up any injected fault, act on the
    /// state under the lock, then release the lock before sleeping.
    async fn run<T>(
        &self,
        op: GatewayOp,
        act: impl FnOnce(&mut PaperState) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let (result, latency) = {
            let mut state = self.state.lock();
            let latency = state.begin(op);
            let result = match state.take_fault(op) {
                Some(fault) => {
                    debug!("[PAPER] injected fault on {:?}: {}", op, fault);
                    Err(fault)
                }
                None => act(&mut state),
            };
            (result, latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, GatewayError> {
        self.run(GatewayOp::PlaceOrder, |s| s.place(request)).await
    }

    async fn cancel_order(
        &self,
        symbol: &Symbol,
        exchange_order_id: &str,
    ) -> Result<(), GatewayError> {
        self.run(GatewayOp::CancelOrder, |s| s.cancel(symbol, exchange_order_id))
            .await
    }

    async fn cancel_orders_in_range(
        &self,
        symbol: &Symbol,
        price_low: Price,
        price_high: Price,
    ) -> Result<(), GatewayError> {
        self.run(GatewayOp::CancelRange, |s| {
            s.cancel_where(symbol, |p| p >= price_low && p <= price_high);
            Ok(())
        })
        .await
    }

    async fn cancel_all_orders(&self, symbol: &Symbol) -> Result<(), GatewayError> {
        self.run(GatewayOp::CancelAll, |s| {
            s.cancel_where(symbol, |_| true);
            Ok(())
        })
        .await
    }

    async fn get_open_orders(
        &self,
        symbol: Option<&Symbol>,
    ) -> Result<Vec<RemoteOrder>, GatewayError> {
        self.run(GatewayOp::OpenOrders, |s| Ok(s.listed_orders(symbol)))
            .await
    }

    async fn get_order(
        &self,
        symbol: &Symbol,
        exchange_order_id: &str,
    ) -> Result<RemoteOrder, GatewayError> {
        self.run(GatewayOp::OrderStatus, |s| {
            s.orders
                .get(exchange_order_id)
                .filter(|o| &o.symbol == symbol)
                .cloned()
                .ok_or_else(|| {
                    GatewayError::ExchangeRejected(format!("unknown order {}", exchange_order_id))
                })
        })
        .await
    }

    async fn get_positions(&self) -> Result<Vec<RemotePosition>, GatewayError> {
        self.run(GatewayOp::Positions, |s| Ok(s.remote_positions()))
            .await
    }

    async fn get_balances(&self) -> Result<Vec<RemoteBalance>, GatewayError> {
        self.run(GatewayOp::Balances, |s| Ok(s.remote_balances()))
            .await
    }

    async fn get_market_price(&self, symbol: &Symbol) -> Result<Price, GatewayError> {
        self.run(GatewayOp::MarketPrice, |s| {
            s.prices.get(symbol).copied().ok_or_else(|| {
                GatewayError::ExchangeRejected(format!("no market price for {}", symbol))
            })
        })
        .await
    }

    async fn get_market_precision(&self, symbol: &Symbol) -> Result<MarketPrecision, GatewayError> {
        self.run(GatewayOp::MarketPrecision, |s| Ok(s.precision(symbol)))
            .await
    }

    fn name(&self) -> &str {
        "PaperExchange"
    }
}
