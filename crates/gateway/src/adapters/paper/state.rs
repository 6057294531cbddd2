use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tiller_core::{OrderType, Price, Quantity, Side, Symbol};

use super::{GatewayOp, MarketFillPolicy};
use crate::error::GatewayError;
use crate::messages::account::{RemoteBalance, RemotePosition};
use crate::messages::market::MarketPrecision;
use crate::messages::order::{OrderAck, OrderRequest, RemoteOrder, RemoteOrderStatus};

#[derive(Debug, Clone, Default)]
pub(super) struct Holding {
    available: Decimal,
    locked: Decimal,
    staked: Decimal,
}

/// Net position with weighted-average entry
#[derive(Debug, Clone, Default)]
pub(super) struct PaperPosition {
    quantity: Decimal,
    avg_price: Decimal,
    margin: Decimal,
    liquidation_price: Option<Price>,
}

impl PaperPosition {
    fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) {
        let signed_qty = quantity * side.sign();
        let new_quantity = self.quantity + signed_qty;

        if new_quantity.is_zero() {
            // Flat, reset avg price
            self.avg_price = Decimal::ZERO;
        } else if (self.quantity >= Decimal::ZERO && signed_qty > Decimal::ZERO)
            || (self.quantity <= Decimal::ZERO && signed_qty < Decimal::ZERO)
        {
            // Adding to position - weighted average
            let total_cost = self.quantity.abs() * self.avg_price + quantity * price;
            self.avg_price = total_cost / new_quantity.abs();
        } else if new_quantity.is_sign_negative() != self.quantity.is_sign_negative() {
            // Flipped sides - new avg price is fill price
            self.avg_price = price;
        }
        // If reducing but not flipping, avg_price stays same

        self.quantity = new_quantity;
    }
}

#[derive(Debug)]
pub(super) struct PaperState {
    pub(super) prices: HashMap<Symbol, Price>,
    pub(super) precisions: HashMap<Symbol, MarketPrecision>,
    holdings: BTreeMap<String, Holding>,
    pub(super) positions: BTreeMap<Symbol, PaperPosition>,
    pub(super) orders: BTreeMap<String, RemoteOrder>,
    next_order_id: u64,
    pub(super) faults: HashMap<GatewayOp, VecDeque<GatewayError>>,
    pub(super) latency: HashMap<GatewayOp, Duration>,
    pub(super) calls: HashMap<GatewayOp, usize>,
    pub(super) market_fill: MarketFillPolicy,
    pub(super) report_closed_orders: bool,
    pub(super) track_positions: bool,
}

impl Default for PaperState {
    fn default() -> Self {
        Self {
            prices: HashMap::new(),
            precisions: HashMap::new(),
            holdings: BTreeMap::new(),
            positions: BTreeMap::new(),
            orders: BTreeMap::new(),
            next_order_id: 1,
            faults: HashMap::new(),
            latency: HashMap::new(),
            calls: HashMap::new(),
            market_fill: MarketFillPolicy::Full,
            report_closed_orders: false,
            track_positions: true,
        }
    }
}

fn rejected(reason: impl Into<String>) -> GatewayError {
    GatewayError::ExchangeRejected(reason.into())
}

impl PaperState {
    /// Count a call and return its configured latency
    pub(super) fn begin(&mut self, op: GatewayOp) -> Duration {
        *self.calls.entry(op).or_insert(0) += 1;
        self.latency.get(&op).copied().unwrap_or(Duration::ZERO)
    }

    pub(super) fn take_fault(&mut self, op: GatewayOp) -> Option<GatewayError> {
        self.faults.get_mut(&op).and_then(|q| q.pop_front())
    }

    pub(super) fn set_balance(
        &mut self,
        asset: &str,
        available: Decimal,
        locked: Decimal,
        staked: Decimal,
    ) {
        self.holdings.insert(
            asset.to_string(),
            Holding {
                available,
                locked,
                staked,
            },
        );
    }

    pub(super) fn set_position(&mut self, symbol: &Symbol, quantity: Quantity, entry_price: Price) {
        self.positions.insert(
            symbol.clone(),
            PaperPosition {
                quantity,
                avg_price: entry_price,
                ..PaperPosition::default()
            },
        );
    }

    pub(super) fn set_position_margin(
        &mut self,
        symbol: &Symbol,
        margin: Decimal,
        liquidation_price: Option<Price>,
    ) {
        let position = self.positions.entry(symbol.clone()).or_default();
        position.margin = margin;
        position.liquidation_price = liquidation_price;
    }

    pub(super) fn precision(&self, symbol: &Symbol) -> MarketPrecision {
        self.precisions
            .get(symbol)
            .copied()
            .unwrap_or_else(|| MarketPrecision::from_decimals(2, 6))
    }

    fn holding(&mut self, asset: &str) -> &mut Holding {
        self.holdings.entry(asset.to_string()).or_default()
    }

    pub(super) fn place(&mut self, request: &OrderRequest) -> Result<OrderAck, GatewayError> {
        if request.quantity <= Decimal::ZERO {
            return Err(rejected("quantity must be positive"));
        }
        let symbol = &request.symbol;
        let (base, quote) = (symbol.base().to_string(), symbol.quote().to_string());

        let exchange_order_id = format!("PAPER-{}", self.next_order_id);
        let now = Utc::now();
        let mut order = RemoteOrder {
            exchange_order_id: exchange_order_id.clone(),
            client_order_id: Some(request.client_order_id.clone()),
            symbol: symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            price: request.price,
            status: RemoteOrderStatus::New,
            updated_at: Some(now),
        };

        let mut avg_price = None;
        match request.order_type {
            OrderType::Limit => {
                let price = request
                    .price
                    .filter(|p| *p > Decimal::ZERO)
                    .ok_or_else(|| rejected("limit order requires a positive price"))?;
                // Lock the funds the order could consume
                let (asset, amount) = match request.side {
                    Side::Buy => (quote, request.quantity * price),
                    Side::Sell => (base, request.quantity),
                };
                let holding = self.holding(&asset);
                if holding.available < amount {
                    return Err(rejected(format!("insufficient {} balance", asset)));
                }
                holding.available -= amount;
                holding.locked += amount;
            }
            OrderType::Market => {
                let price = *self
                    .prices
                    .get(symbol)
                    .ok_or_else(|| rejected(format!("no market price for {}", symbol)))?;
                let fill_qty = match self.market_fill {
                    MarketFillPolicy::Full => request.quantity,
                    MarketFillPolicy::Partial(fraction) => {
                        (request.quantity * fraction).min(request.quantity)
                    }
                    MarketFillPolicy::Resting => Decimal::ZERO,
                };
                let (asset, needed) = match request.side {
                    Side::Buy => (quote, fill_qty * price),
                    Side::Sell => (base, fill_qty),
                };
                if self.holding(&asset).available < needed {
                    return Err(rejected(format!("insufficient {} balance", asset)));
                }
                if fill_qty > Decimal::ZERO {
                    self.settle(&mut order, fill_qty, price);
                    avg_price = Some(price);
                }
            }
        }

        self.next_order_id += 1;
        let ack = OrderAck {
            exchange_order_id: exchange_order_id.clone(),
            status: order.status,
            filled_quantity: order.filled_quantity,
            avg_price,
            timestamp: Some(now),
        };
        self.orders.insert(exchange_order_id, order);
        Ok(ack)
    }

    /// Move balances and position for a fill of `qty` at `price`, and advance
    /// the order's fill state
    fn settle(&mut self, order: &mut RemoteOrder, qty: Quantity, price: Price) {
        let base = order.symbol.base().to_string();
        let quote = order.symbol.quote().to_string();
        let resting_limit = order.order_type == OrderType::Limit;
        let cost = qty * price;

        match order.side {
            Side::Buy => {
                let q = self.holding(&quote);
                if resting_limit {
                    q.locked -= cost;
                } else {
                    q.available -= cost;
                }
                self.holding(&base).available += qty;
            }
            Side::Sell => {
                let b = self.holding(&base);
                if resting_limit {
                    b.locked -= qty;
                } else {
                    b.available -= qty;
                }
                self.holding(&quote).available += cost;
            }
        }

        if self.track_positions {
            self.positions
                .entry(order.symbol.clone())
                .or_default()
                .apply_fill(order.side, qty, price);
        }

        order.filled_quantity += qty;
        order.status = if order.filled_quantity >= order.quantity {
            RemoteOrderStatus::Filled
        } else {
            RemoteOrderStatus::PartiallyFilled
        };
        order.updated_at = Some(Utc::now());
    }

    pub(super) fn fill_resting(
        &mut self,
        exchange_order_id: &str,
        quantity: Quantity,
    ) -> Result<(), GatewayError> {
        let mut order = self
            .orders
            .remove(exchange_order_id)
            .ok_or_else(|| rejected(format!("unknown order {}", exchange_order_id)))?;
        if order.status.is_terminal() {
            self.orders.insert(exchange_order_id.to_string(), order);
            return Err(rejected("order is not open"));
        }
        let price = match order.price {
            Some(p) => p,
            None => match self.prices.get(&order.symbol) {
                Some(p) => *p,
                None => {
                    self.orders.insert(exchange_order_id.to_string(), order);
                    return Err(rejected("no market price"));
                }
            },
        };
        let qty = quantity.min(order.quantity - order.filled_quantity);
        self.settle(&mut order, qty, price);
        self.orders.insert(exchange_order_id.to_string(), order);
        Ok(())
    }

    /// Unlock whatever a resting order still holds
    fn release(&mut self, order: &RemoteOrder) {
        if order.order_type != OrderType::Limit {
            return;
        }
        let remaining = order.quantity - order.filled_quantity;
        let (asset, amount) = match order.side {
            Side::Buy => (
                order.symbol.quote().to_string(),
                remaining * order.price.unwrap_or(Decimal::ZERO),
            ),
            Side::Sell => (order.symbol.base().to_string(), remaining),
        };
        let holding = self.holding(&asset);
        holding.locked -= amount;
        holding.available += amount;
    }

    fn cancel_one(&mut self, exchange_order_id: &str) {
        if let Some(mut order) = self.orders.remove(exchange_order_id) {
            if !order.status.is_terminal() {
                self.release(&order);
                order.status = RemoteOrderStatus::Cancelled;
                order.updated_at = Some(Utc::now());
            }
            self.orders.insert(exchange_order_id.to_string(), order);
        }
    }

    pub(super) fn cancel(
        &mut self,
        symbol: &Symbol,
        exchange_order_id: &str,
    ) -> Result<(), GatewayError> {
        match self.orders.get(exchange_order_id) {
            Some(order) if &order.symbol == symbol && !order.status.is_terminal() => {
                self.cancel_one(exchange_order_id);
                Ok(())
            }
            Some(_) => Err(rejected("order is not open")),
            None => Err(rejected(format!("unknown order {}", exchange_order_id))),
        }
    }

    /// Cancel open orders for `symbol` whose limit price satisfies `in_scope`
    pub(super) fn cancel_where(&mut self, symbol: &Symbol, in_scope: impl Fn(Price) -> bool) {
        let targets: Vec<String> = self
            .orders
            .values()
            .filter(|o| &o.symbol == symbol && !o.status.is_terminal())
            .filter(|o| o.price.map(&in_scope).unwrap_or(false))
            .map(|o| o.exchange_order_id.clone())
            .collect();
        for id in targets {
            self.cancel_one(&id);
        }
    }

    pub(super) fn listed_orders(&self, symbol: Option<&Symbol>) -> Vec<RemoteOrder> {
        self.orders
            .values()
            .filter(|o| symbol.is_none_or(|s| &o.symbol == s))
            .filter(|o| self.report_closed_orders || !o.status.is_terminal())
            .cloned()
            .collect()
    }

    pub(super) fn remote_positions(&self) -> Vec<RemotePosition> {
        self.positions
            .iter()
            .filter(|(_, p)| !p.quantity.is_zero())
            .map(|(symbol, p)| RemotePosition {
                symbol: symbol.clone(),
                quantity: p.quantity,
                entry_price: p.avg_price,
                mark_price: self.prices.get(symbol).copied(),
                margin: p.margin,
                liquidation_price: p.liquidation_price,
            })
            .collect()
    }

    pub(super) fn remote_balance(&self, asset: &str) -> Option<RemoteBalance> {
        self.holdings.get(asset).map(|h| RemoteBalance {
            asset: asset.to_string(),
            available: h.available,
            locked: h.locked,
            staked: h.staked,
        })
    }

    pub(super) fn remote_balances(&self) -> Vec<RemoteBalance> {
        self.holdings
            .keys()
            .filter_map(|asset| self.remote_balance(asset))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_paper_position_average_and_flip() {
        let mut pos = PaperPosition::default();
        pos.apply_fill(Side::Buy, dec!(1), dec!(100));
        pos.apply_fill(Side::Buy, dec!(1), dec!(110));
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.avg_price, dec!(105));

        // Reduce: average unchanged
        pos.apply_fill(Side::Sell, dec!(1), dec!(120));
        assert_eq!(pos.avg_price, dec!(105));

        // Flip to short at the fill price
        pos.apply_fill(Side::Sell, dec!(3), dec!(90));
        assert_eq!(pos.quantity, dec!(-2));
        assert_eq!(pos.avg_price, dec!(90));

        pos.apply_fill(Side::Buy, dec!(2), dec!(80));
        assert!(pos.quantity.is_zero());
        assert_eq!(pos.avg_price, dec!(0));
    }
}
