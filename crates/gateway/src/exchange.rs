//! The exchange port consumed by the trading core

use async_trait::async_trait;
use tiller_core::{Price, Symbol};

use crate::error::GatewayError;
use crate::messages::account::{RemoteBalance, RemotePosition};
use crate::messages::market::MarketPrecision;
use crate::messages::order::{OrderAck, OrderRequest, RemoteOrder};

/// Authenticated exchange capability.
///
/// Any call may fail transiently. Implementations own transport, signing
/// and rate limiting; none of it is visible here.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Submit an order; the acknowledgment carries the exchange id and any
    /// fill already reported
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, GatewayError>;

    /// Cancel one resting order
    async fn cancel_order(
        &self,
        symbol: &Symbol,
        exchange_order_id: &str,
    ) -> Result<(), GatewayError>;

    /// Cancel every resting order for `symbol` priced within `[price_low, price_high]`
    async fn cancel_orders_in_range(
        &self,
        symbol: &Symbol,
        price_low: Price,
        price_high: Price,
    ) -> Result<(), GatewayError>;

    /// Cancel every resting order for `symbol`
    async fn cancel_all_orders(&self, symbol: &Symbol) -> Result<(), GatewayError>;

    /// Authoritative order list. Some exchanges also include recently closed
    /// orders with their terminal status.
    async fn get_open_orders(
        &self,
        symbol: Option<&Symbol>,
    ) -> Result<Vec<RemoteOrder>, GatewayError>;

    /// Current state of one order, open or closed. Fails with
    /// `ExchangeRejected` when the exchange no longer knows the order.
    async fn get_order(
        &self,
        symbol: &Symbol,
        exchange_order_id: &str,
    ) -> Result<RemoteOrder, GatewayError>;

    async fn get_positions(&self) -> Result<Vec<RemotePosition>, GatewayError>;

    async fn get_balances(&self) -> Result<Vec<RemoteBalance>, GatewayError>;

    async fn get_market_price(&self, symbol: &Symbol) -> Result<Price, GatewayError>;

    /// Tick and step size of a market
    async fn get_market_precision(&self, symbol: &Symbol) -> Result<MarketPrecision, GatewayError>;

    /// Adapter name for logging
    fn name(&self) -> &str {
        "ExchangeGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ensure the port is object-safe
    fn _assert_gateway_object_safe(_: &dyn ExchangeGateway) {}
}
