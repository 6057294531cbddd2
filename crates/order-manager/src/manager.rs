//! Order Manager
//!
//! Builds orders from user intent, gates them through the risk check,
//! submits them and keeps the local order table in line with the exchange.
//!
//! The order table lock is never held across a gateway call: state is read,
//! the lock released, the call made, and the result applied under a fresh
//! lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_clock::Clock;
use tiller_core::{
    AccountSnapshot, DomainError, Order, OrderId, OrderStatus, Price, Quantity, Side, Symbol,
    TieredOrderPlan,
};
use tiller_gateway::{
    ExchangeGateway, GatewayError, MarketPrecision, OrderAck, OrderRequest, RemoteOrderStatus,
    with_deadline,
};
use tiller_risk_manager::{MarketContext, RiskDecision, RiskLimits, RiskManager};

use crate::config::OrderManagerConfig;
use crate::error::{OrderError, Result};
use crate::reconcile::{Merge, RefreshReport, apply_remote_progress, merge_remote, reconcile};
use crate::tiers::{Tier, generate_tiers};

/// Inputs for the pre-trade check, copied once per command so the check and
/// the submission see the same account state
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub snapshot: AccountSnapshot,
    pub limits: RiskLimits,
    pub portfolio_value: Decimal,
}

impl RiskContext {
    pub fn new(snapshot: AccountSnapshot, limits: RiskLimits, quote_asset: &str) -> Self {
        let portfolio_value = snapshot.portfolio_value(quote_asset);
        Self {
            snapshot,
            limits,
            portfolio_value,
        }
    }
}

/// Outcome of one tier of a tiered placement
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Placed(Order),
    Failed { tier: Tier, error: OrderError },
}

/// Per-tier results, in tier order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierReport {
    pub outcomes: Vec<TierOutcome>,
}

impl TierReport {
    pub fn placed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TierOutcome::Placed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.placed()
    }

    pub fn placed_orders(&self) -> impl Iterator<Item = &Order> {
        self.outcomes.iter().filter_map(|o| match o {
            TierOutcome::Placed(order) => Some(order),
            TierOutcome::Failed { .. } => None,
        })
    }
}

/// Orders cancelled by a bulk cancel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReport {
    pub cancelled: Vec<OrderId>,
}

impl CancelReport {
    pub fn count(&self) -> usize {
        self.cancelled.len()
    }
}

pub struct OrderManager {
    gateway: Arc<dyn ExchangeGateway>,
    clock: Arc<dyn Clock>,
    config: OrderManagerConfig,
    orders: RwLock<HashMap<OrderId, Order>>,
    /// Tick and step sizes, fetched once per symbol
    precisions: RwLock<HashMap<Symbol, MarketPrecision>>,
}

impl OrderManager {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        clock: Arc<dyn Clock>,
        config: OrderManagerConfig,
    ) -> Self {
        Self {
            gateway,
            clock,
            config,
            orders: RwLock::new(HashMap::new()),
            precisions: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Place a market order. The risk check uses a freshly fetched market
    /// price, falling back to the snapshot's last price.
    pub async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Quantity,
        risk: &RiskContext,
    ) -> Result<Order> {
        let order = Order::market(symbol.clone(), side, quantity, self.clock.now())?;
        let reference_price = self.reference_price(symbol, &risk.snapshot).await?;
        self.submit(order, reference_price, risk).await
    }

    /// Place a limit order at exactly `price`
    pub async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Quantity,
        price: Price,
        risk: &RiskContext,
    ) -> Result<Order> {
        let order = Order::limit(symbol.clone(), side, quantity, price, self.clock.now())?;
        self.submit(order, price, risk).await
    }

    /// Place every tier of `plan` as an independent limit order.
    ///
    /// Interior tier prices snap to the market's tick and quantities to its
    /// step. Tiers are risk-checked in turn against one account copy that
    /// counts the tiers already accepted. A failed tier does not undo or stop
    /// the others; the report says which tiers are resting.
    pub async fn place_tiered_orders(
        &self,
        plan: &TieredOrderPlan,
        risk: &RiskContext,
    ) -> Result<TierReport> {
        plan.validate()?;
        let precision = self.market_precision(&plan.symbol).await;
        let tiers = generate_tiers(plan, &precision)?;
        info!(
            "[ORDER] tiered {:?} {} in {} tiers over [{}, {}]",
            plan.side, plan.symbol, plan.tier_count, plan.price_low, plan.price_high
        );

        let mut working = risk.clone();
        let mut report = TierReport::default();

        for tier in tiers {
            let outcome = match self
                .place_limit_order(&plan.symbol, plan.side, tier.quantity, tier.price, &working)
                .await
            {
                Ok(order) => {
                    working
                        .snapshot
                        .reserve_order(&plan.symbol, plan.side, tier.quantity, tier.price);
                    TierOutcome::Placed(order)
                }
                Err(OrderError::Invariant(e)) => return Err(OrderError::Invariant(e)),
                Err(error) => {
                    warn!("[ORDER] tier {} at {} failed: {}", tier.index + 1, tier.price, error);
                    TierOutcome::Failed { tier, error }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            "[ORDER] tiered {}: {} placed, {} failed",
            plan.symbol,
            report.placed(),
            report.failed()
        );
        Ok(report)
    }

    /// Tick and step size for `symbol`. Cached after the first answer; when
    /// the exchange cannot say, the configured decimals stand in and the
    /// next call asks again.
    pub async fn market_precision(&self, symbol: &Symbol) -> MarketPrecision {
        let cached = self.precisions.read().get(symbol).copied();
        if let Some(precision) = cached {
            return precision;
        }
        match with_deadline(
            self.config.gateway_timeout,
            self.gateway.get_market_precision(symbol),
        )
        .await
        {
            Ok(precision) => {
                debug!(
                    "[ORDER] {} tick {} step {}",
                    symbol, precision.tick_size, precision.step_size
                );
                self.precisions.write().insert(symbol.clone(), precision);
                precision
            }
            Err(e) => {
                let fallback = self.config.fallback_precision();
                warn!(
                    "[ORDER] precision for {} unavailable ({}), using tick {} step {}",
                    symbol,
                    e.sanitized(),
                    fallback.tick_size,
                    fallback.step_size
                );
                fallback
            }
        }
    }

    async fn reference_price(&self, symbol: &Symbol, snapshot: &AccountSnapshot) -> Result<Price> {
        match with_deadline(
            self.config.gateway_timeout,
            self.gateway.get_market_price(symbol),
        )
        .await
        {
            Ok(price) => Ok(price),
            Err(e) => match snapshot.price(symbol) {
                Some(price) => {
                    warn!(
                        "[ORDER] market price for {} unavailable ({}), using last {}",
                        symbol,
                        e.sanitized(),
                        price
                    );
                    Ok(price)
                }
                None => Err(OrderError::gateway(None, e)),
            },
        }
    }

    /// Risk-check, record and submit a validated pending order
    async fn submit(&self, mut order: Order, reference_price: Price, risk: &RiskContext) -> Result<Order> {
        let market = MarketContext::new(reference_price, risk.portfolio_value);
        if let RiskDecision::Reject(reason) =
            RiskManager::evaluate(&order, &risk.snapshot, &market, &risk.limits)
        {
            order.reject(reason.to_string(), self.clock.now())?;
            self.orders.write().insert(order.id(), order);
            return Err(OrderError::RiskRejected(reason));
        }

        let id = order.id();
        let request = OrderRequest::from(&order);
        self.orders.write().insert(id, order);
        debug!(
            "[ORDER] submitting {} {:?} {:?} {} {} @ {:?}",
            id, request.side, request.order_type, request.quantity, request.symbol, request.price
        );

        let result = with_deadline(
            self.config.gateway_timeout,
            self.gateway.place_order(&request),
        )
        .await;

        match result {
            Ok(ack) => self.apply_ack(id, &ack),
            Err(e) => Err(self.apply_submit_failure(id, e)),
        }
    }

    fn apply_ack(&self, id: OrderId, ack: &OrderAck) -> Result<Order> {
        let now = self.clock.now();
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| OrderError::NotFound(id.to_string()))?;

        if ack.status == RemoteOrderStatus::Rejected {
            if order.status().can_transition_to(OrderStatus::Rejected) {
                order.reject("rejected by exchange", now)?;
            }
            info!("[ORDER] {} rejected by exchange", id);
            return Err(OrderError::gateway(
                Some(id),
                GatewayError::ExchangeRejected("order rejected".to_string()),
            ));
        }

        if !order.status().is_terminal() {
            order.acknowledge(&ack.exchange_order_id, now)?;
        }
        apply_remote_progress(order, ack.status, ack.filled_quantity, now)?;
        if let Some(ts) = ack.timestamp {
            order.set_exchange_updated_at(ts);
        }

        info!(
            "[ORDER] {} accepted as {} ({:?}, filled {}/{})",
            id,
            ack.exchange_order_id,
            order.status(),
            order.filled_quantity(),
            order.quantity
        );
        Ok(order.clone())
    }

    /// Network/Timeout: outcome unknown, leave for reconciliation.
    /// Auth/ExchangeRejected: the order never rested, mark it rejected.
    fn apply_submit_failure(&self, id: OrderId, error: GatewayError) -> OrderError {
        let now = self.clock.now();
        let mut orders = self.orders.write();
        if let Some(order) = orders.get_mut(&id) {
            let outcome = match &error {
                GatewayError::Timeout(_) => order.transition(OrderStatus::Unknown, now).map(|_| ()),
                GatewayError::Network(_) => Ok(()),
                GatewayError::Auth(_) | GatewayError::ExchangeRejected(_) => {
                    order.reject(error.sanitized(), now)
                }
            };
            if let Err(e) = outcome {
                // A concurrent refresh already resolved the order
                debug!("[ORDER] {} left as {:?}: {}", id, order.status(), e);
            }
            warn!(
                "[ORDER] submission of {} failed ({:?}), order is {:?}",
                id,
                error.kind(),
                order.status()
            );
        }
        OrderError::gateway(Some(id), error)
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancel one resting order
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let (symbol, exchange_order_id) = {
            let orders = self.orders.read();
            let order = orders
                .get(&order_id)
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
            if !order.status().is_cancellable() {
                return Err(OrderError::Validation(format!(
                    "order {} is {:?} and cannot be cancelled",
                    order_id,
                    order.status()
                )));
            }
            let exchange_order_id = order.exchange_order_id().ok_or_else(|| {
                OrderError::Validation(format!(
                    "order {} has no exchange id yet; refresh orders first",
                    order_id
                ))
            })?;
            (order.symbol.clone(), exchange_order_id.to_string())
        };

        with_deadline(
            self.config.gateway_timeout,
            self.gateway.cancel_order(&symbol, &exchange_order_id),
        )
        .await
        .map_err(|e| OrderError::gateway(Some(order_id), e))?;

        // The exchange confirmed this exact order, so an Unknown one counts too
        self.mark_cancelled(&[order_id], |status| {
            status.can_transition_to(OrderStatus::Cancelled)
        });
        info!("[ORDER] cancelled {} ({})", order_id, exchange_order_id);
        self.get(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// Cancel every resting order for `symbol`. No matching local orders is
    /// a no-op. `Unknown` orders are left to reconciliation: the exchange may
    /// already have filled them.
    pub async fn cancel_all_for_symbol(&self, symbol: &Symbol) -> Result<CancelReport> {
        let targets = self.cancellable(symbol, |_| true);
        if targets.is_empty() {
            debug!("[ORDER] cancel all {}: nothing open", symbol);
            return Ok(CancelReport::default());
        }

        with_deadline(
            self.config.gateway_timeout,
            self.gateway.cancel_all_orders(symbol),
        )
        .await
        .map_err(|e| OrderError::gateway(None, e))?;

        let cancelled = self.mark_cancelled(&targets, |status| status.is_active());
        info!("[ORDER] cancelled {} orders for {}", cancelled.len(), symbol);
        Ok(CancelReport { cancelled })
    }

    /// Cancel resting limit orders for `symbol` priced within
    /// `[price_low, price_high]`. An empty range is a no-op.
    pub async fn cancel_orders_in_range(
        &self,
        symbol: &Symbol,
        price_low: Price,
        price_high: Price,
    ) -> Result<CancelReport> {
        if price_low > price_high {
            return Err(OrderError::Validation(format!(
                "lower price {} is above upper price {}",
                price_low, price_high
            )));
        }
        let targets = self.cancellable(symbol, |order| {
            order
                .price
                .is_some_and(|p| p >= price_low && p <= price_high)
        });
        if targets.is_empty() {
            debug!(
                "[ORDER] cancel {} in [{}, {}]: nothing open",
                symbol, price_low, price_high
            );
            return Ok(CancelReport::default());
        }

        with_deadline(
            self.config.gateway_timeout,
            self.gateway
                .cancel_orders_in_range(symbol, price_low, price_high),
        )
        .await
        .map_err(|e| OrderError::gateway(None, e))?;

        let cancelled = self.mark_cancelled(&targets, |status| status.is_active());
        info!(
            "[ORDER] cancelled {} orders for {} in [{}, {}]",
            cancelled.len(),
            symbol,
            price_low,
            price_high
        );
        Ok(CancelReport { cancelled })
    }

    /// Acknowledged, known-resting orders for `symbol` passing `filter`
    fn cancellable(&self, symbol: &Symbol, filter: impl Fn(&Order) -> bool) -> Vec<OrderId> {
        self.orders
            .read()
            .values()
            .filter(|o| &o.symbol == symbol)
            .filter(|o| o.status().is_active() && o.exchange_order_id().is_some())
            .filter(|o| filter(o))
            .map(|o| o.id())
            .collect()
    }

    /// Mark orders cancelled after the exchange acknowledged the cancel.
    /// Only orders whose current status passes `eligible` move; anything
    /// filled or resolved in the meantime is left alone.
    fn mark_cancelled(&self, ids: &[OrderId], eligible: impl Fn(OrderStatus) -> bool) -> Vec<OrderId> {
        let now = self.clock.now();
        let mut orders = self.orders.write();
        ids.iter()
            .filter(|id| {
                orders.get_mut(*id).is_some_and(|order| {
                    eligible(order.status())
                        && order.status().can_transition_to(OrderStatus::Cancelled)
                        && order.transition(OrderStatus::Cancelled, now).is_ok()
                })
            })
            .copied()
            .collect()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Fetch the exchange's order list and reconcile the local table, then
    /// look up each `Unknown` order the list left out.
    ///
    /// Idempotent for an unchanged remote state. Local changes made after
    /// the request was issued win over the report.
    pub async fn refresh_open_orders(&self, symbol: Option<&Symbol>) -> Result<RefreshReport> {
        let issued_at = self.clock.now();
        let remote = with_deadline(
            self.config.gateway_timeout,
            self.gateway.get_open_orders(symbol),
        )
        .await
        .map_err(|e| OrderError::gateway(None, e))?;

        let now = self.clock.now();
        let mut report = {
            let mut orders = self.orders.write();
            reconcile(&mut orders, &remote, symbol, issued_at, now)
        }
        .map_err(invariant_violated)?;

        let listed: HashSet<&str> = remote.iter().map(|r| r.exchange_order_id.as_str()).collect();
        self.resolve_unknown(symbol, &listed, &mut report).await?;

        if report != RefreshReport::default() {
            info!(
                "[REFRESH] orders: {} adopted, {} updated, {} unknown, {} resolved, {} stale skipped",
                report.adopted,
                report.updated,
                report.marked_unknown,
                report.resolved,
                report.skipped_stale
            );
        }
        Ok(report)
    }

    /// Ask the exchange about each in-scope `Unknown` order missing from
    /// `listed`. A failed lookup leaves the order `Unknown` for the next poll.
    async fn resolve_unknown(
        &self,
        scope: Option<&Symbol>,
        listed: &HashSet<&str>,
        report: &mut RefreshReport,
    ) -> Result<()> {
        let targets: Vec<(OrderId, Symbol, String)> = self
            .orders
            .read()
            .values()
            .filter(|o| o.status() == OrderStatus::Unknown)
            .filter(|o| scope.is_none_or(|s| &o.symbol == s))
            .filter_map(|o| {
                o.exchange_order_id()
                    .filter(|ex| !listed.contains(ex))
                    .map(|ex| (o.id(), o.symbol.clone(), ex.to_string()))
            })
            .collect();

        for (id, symbol, exchange_order_id) in targets {
            let issued_at = self.clock.now();
            let remote = match with_deadline(
                self.config.gateway_timeout,
                self.gateway.get_order(&symbol, &exchange_order_id),
            )
            .await
            {
                Ok(remote) => remote,
                Err(e) => {
                    debug!(
                        "[REFRESH] lookup of {} ({}) failed, still Unknown: {}",
                        id,
                        exchange_order_id,
                        e.sanitized()
                    );
                    continue;
                }
            };

            let now = self.clock.now();
            let mut orders = self.orders.write();
            let Some(order) = orders.get_mut(&id) else {
                continue;
            };
            match merge_remote(order, &remote, issued_at, now).map_err(invariant_violated)? {
                Merge::Updated => {
                    debug!("[REFRESH] {} resolved as {:?}", id, order.status());
                    report.resolved += 1;
                }
                Merge::Stale => report.skipped_stale += 1,
                Merge::Unchanged => {}
            }
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.orders.read().get(&order_id).cloned()
    }

    /// Non-terminal orders, oldest first
    pub fn open_orders(&self, symbol: Option<&Symbol>) -> Vec<Order> {
        let mut open: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|o| !o.status().is_terminal())
            .filter(|o| symbol.is_none_or(|s| &o.symbol == s))
            .cloned()
            .collect();
        open.sort_by_key(|o| o.created_at);
        open
    }

    /// Every order this session knows, oldest first
    pub fn all_orders(&self) -> Vec<Order> {
        let mut all: Vec<Order> = self.orders.read().values().cloned().collect();
        all.sort_by_key(|o| o.created_at);
        all
    }
}

fn invariant_violated(e: DomainError) -> OrderError {
    error!("[REFRESH] order table invariant violated: {}", e);
    OrderError::from(e)
}
