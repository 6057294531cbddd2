//! Pre-trade Risk Evaluation
//!
//! Validates a proposed order against the account snapshot and the
//! configured limits. This module doesn't track state - it just validates.

use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiller_core::{AccountSnapshot, Order, Price, Side};

use crate::limits::RiskLimits;

/// Market inputs the caller gathers before asking for a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketContext {
    /// Limit price for limit orders, current market price for market orders
    pub reference_price: Price,
    /// Total portfolio value in quote currency
    pub portfolio_value: Decimal,
}

impl MarketContext {
    pub fn new(reference_price: Price, portfolio_value: Decimal) -> Self {
        Self {
            reference_price,
            portfolio_value,
        }
    }
}

/// Why an order was vetoed, with the numbers that triggered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RejectReason {
    #[error("projected position {projected_notional} exceeds limit {limit}")]
    ExceedsPositionLimit {
        projected_notional: Decimal,
        limit: Decimal,
    },

    #[error("order value {notional} exceeds {percentage}% of portfolio ({limit})")]
    ExceedsRiskPercentage {
        notional: Decimal,
        percentage: Decimal,
        limit: Decimal,
    },

    #[error("insufficient {asset}: need {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    /// Quantity and price whose product does not fit a decimal
    #[error("order value {quantity} x {price} is out of range")]
    ValueOutOfRange { quantity: Decimal, price: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskDecision {
    Approve,
    Reject(RejectReason),
}

impl RiskDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskDecision::Approve)
    }
}

/// Stateless pre-trade checker
pub struct RiskManager;

impl RiskManager {
    /// Evaluate a proposed order.
    ///
    /// Deterministic in its inputs and never mutates them. Checks run in a
    /// fixed order and the first failure wins.
    pub fn evaluate(
        order: &Order,
        snapshot: &AccountSnapshot,
        market: &MarketContext,
        limits: &RiskLimits,
    ) -> RiskDecision {
        let decision = Self::check_range(order, snapshot, market)
            .or_else(|| Self::check_position_limit(order, snapshot, market, limits))
            .or_else(|| Self::check_risk_percentage(order, market, limits))
            .or_else(|| Self::check_funds(order, snapshot, market))
            .map(RiskDecision::Reject)
            .unwrap_or(RiskDecision::Approve);

        match &decision {
            RiskDecision::Approve => debug!(
                "[RISK] approved {:?} {} {} @ {}",
                order.side, order.quantity, order.symbol, market.reference_price
            ),
            RiskDecision::Reject(reason) => info!(
                "[RISK REJECTED] {:?} {} {}: {}",
                order.side, order.quantity, order.symbol, reason
            ),
        }
        decision
    }

    /// Order and projected position value at the reference price, `None`
    /// when either overflows
    fn values(
        order: &Order,
        snapshot: &AccountSnapshot,
        market: &MarketContext,
    ) -> Option<(Decimal, Decimal)> {
        let notional = order.quantity.checked_mul(market.reference_price)?;
        let projected = snapshot
            .position_quantity(&order.symbol)
            .checked_add(order.side.sign() * order.quantity)?;
        let projected_notional = projected.abs().checked_mul(market.reference_price)?;
        Some((notional, projected_notional))
    }

    /// 0. Every value the checks below compute must be representable
    fn check_range(
        order: &Order,
        snapshot: &AccountSnapshot,
        market: &MarketContext,
    ) -> Option<RejectReason> {
        Self::values(order, snapshot, market)
            .is_none()
            .then(|| RejectReason::ValueOutOfRange {
                quantity: order.quantity,
                price: market.reference_price,
            })
    }

    /// 1. Projected absolute position notional must stay within the limit
    fn check_position_limit(
        order: &Order,
        snapshot: &AccountSnapshot,
        market: &MarketContext,
        limits: &RiskLimits,
    ) -> Option<RejectReason> {
        let (_, projected_notional) = Self::values(order, snapshot, market)?;

        (projected_notional > limits.max_position_size).then(|| {
            RejectReason::ExceedsPositionLimit {
                projected_notional,
                limit: limits.max_position_size,
            }
        })
    }

    /// 2. Order notional must stay within the per-trade share of the portfolio.
    ///
    /// Skipped when the portfolio value is unknown or zero; the funds check
    /// still applies.
    fn check_risk_percentage(
        order: &Order,
        market: &MarketContext,
        limits: &RiskLimits,
    ) -> Option<RejectReason> {
        if market.portfolio_value <= Decimal::ZERO {
            return None;
        }
        let notional = order.quantity.checked_mul(market.reference_price)?;
        let limit = limits.risk_budget(market.portfolio_value);

        (notional > limit).then(|| RejectReason::ExceedsRiskPercentage {
            notional,
            percentage: limits.risk_percentage_per_trade,
            limit,
        })
    }

    /// 3. The account must hold what the order spends
    fn check_funds(
        order: &Order,
        snapshot: &AccountSnapshot,
        market: &MarketContext,
    ) -> Option<RejectReason> {
        let (asset, required, available) = match order.side {
            Side::Buy => {
                let asset = order.symbol.quote();
                (
                    asset,
                    order.quantity.checked_mul(market.reference_price)?,
                    snapshot.available(asset),
                )
            }
            Side::Sell => {
                let asset = order.symbol.base();
                let long = snapshot.position_quantity(&order.symbol).max(Decimal::ZERO);
                (asset, order.quantity, snapshot.available(asset).max(long))
            }
        };

        (required > available).then(|| RejectReason::InsufficientFunds {
            asset: asset.to_string(),
            required,
            available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tiller_core::{Balance, Position, Symbol};

    fn sol() -> Symbol {
        Symbol::new("SOL_USDC").unwrap()
    }

    fn snapshot(usdc: Decimal, sol_available: Decimal) -> AccountSnapshot {
        let mut snap = AccountSnapshot::default();
        for b in [
            Balance::new("USDC", usdc, dec!(0), dec!(0)).unwrap(),
            Balance::new("SOL", sol_available, dec!(0), dec!(0)).unwrap(),
        ] {
            snap.balances.insert(b.asset().to_string(), b);
        }
        snap
    }

    fn with_position(mut snap: AccountSnapshot, quantity: Decimal) -> AccountSnapshot {
        snap.positions.insert(
            sol(),
            Position::new(sol(), quantity, dec!(100), dec!(100)),
        );
        snap
    }

    fn limit(side: Side, qty: Decimal, price: Decimal) -> Order {
        Order::limit(sol(), side, qty, price, Utc::now()).unwrap()
    }

    #[test]
    fn test_approves_within_limits() {
        let snap = snapshot(dec!(10_000), dec!(0));
        let order = limit(Side::Buy, dec!(2), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(10_000));

        let decision = RiskManager::evaluate(&order, &snap, &market, &RiskLimits::default());
        assert!(decision.is_approved());
    }

    #[test]
    fn test_rejects_projected_position_over_limit() {
        let _ = env_logger::try_init();
        // 900 of exposure already, buying 200 more
        let snap = with_position(snapshot(dec!(10_000), dec!(0)), dec!(9));
        let order = limit(Side::Buy, dec!(2), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(10_000));
        let limits = RiskLimits::new(dec!(1000), dec!(50));

        let decision = RiskManager::evaluate(&order, &snap, &market, &limits);
        assert_eq!(
            decision,
            RiskDecision::Reject(RejectReason::ExceedsPositionLimit {
                projected_notional: dec!(1100),
                limit: dec!(1000),
            })
        );
    }

    #[test]
    fn test_reducing_sell_passes_position_limit() {
        let snap = with_position(snapshot(dec!(0), dec!(0)), dec!(9));
        let order = limit(Side::Sell, dec!(3), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(900));
        let limits = RiskLimits::new(dec!(1000), dec!(50));

        // Long position covers the sell even though SOL available is zero
        let decision = RiskManager::evaluate(&order, &snap, &market, &limits);
        assert!(decision.is_approved());
    }

    #[test]
    fn test_rejects_over_risk_percentage() {
        let snap = snapshot(dec!(10_000), dec!(0));
        let order = limit(Side::Buy, dec!(3), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(10_000));
        let limits = RiskLimits::new(dec!(1_000_000), dec!(2));

        match RiskManager::evaluate(&order, &snap, &market, &limits) {
            RiskDecision::Reject(RejectReason::ExceedsRiskPercentage {
                notional, limit, ..
            }) => {
                assert_eq!(notional, dec!(300));
                assert_eq!(limit, dec!(200));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_zero_portfolio_skips_risk_percentage() {
        let snap = snapshot(dec!(0), dec!(0));
        let order = limit(Side::Buy, dec!(1), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(0));

        // Falls through to the funds check
        let decision = RiskManager::evaluate(&order, &snap, &market, &RiskLimits::default());
        assert!(matches!(
            decision,
            RiskDecision::Reject(RejectReason::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_rejects_insufficient_quote_for_buy() {
        let snap = snapshot(dec!(50), dec!(0));
        let order = limit(Side::Buy, dec!(1), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(50));
        let limits = RiskLimits::new(dec!(1000), dec!(100));

        let decision = RiskManager::evaluate(&order, &snap, &market, &limits);
        assert_eq!(
            decision,
            RiskDecision::Reject(RejectReason::InsufficientFunds {
                asset: "USDC".to_string(),
                required: dec!(100),
                available: dec!(50),
            })
        );
    }

    #[test]
    fn test_rejects_insufficient_base_for_sell() {
        let snap = snapshot(dec!(1000), dec!(0.5));
        let order = limit(Side::Sell, dec!(1), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(1050));

        let decision = RiskManager::evaluate(&order, &snap, &market, &RiskLimits::default());
        assert!(matches!(
            decision,
            RiskDecision::Reject(RejectReason::InsufficientFunds { ref asset, .. }) if asset == "SOL"
        ));
    }

    #[test]
    fn test_first_failure_wins() {
        // Breaks all three checks; position limit is reported
        let snap = snapshot(dec!(10), dec!(0));
        let order = limit(Side::Buy, dec!(50), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(10));
        let limits = RiskLimits::new(dec!(1000), dec!(1));

        let decision = RiskManager::evaluate(&order, &snap, &market, &limits);
        assert!(matches!(
            decision,
            RiskDecision::Reject(RejectReason::ExceedsPositionLimit { .. })
        ));
    }

    #[test]
    fn test_overflowing_order_value_rejected() {
        let snap = snapshot(dec!(10_000), dec!(0));
        let order = Order::market(sol(), Side::Buy, Decimal::MAX, Utc::now()).unwrap();
        let market = MarketContext::new(dec!(2), dec!(10_000));

        let decision = RiskManager::evaluate(&order, &snap, &market, &RiskLimits::default());
        assert_eq!(
            decision,
            RiskDecision::Reject(RejectReason::ValueOutOfRange {
                quantity: Decimal::MAX,
                price: dec!(2),
            })
        );
    }

    #[test]
    fn test_overflowing_projected_position_rejected() {
        // Order value fits, but adding it to the held position does not
        let snap = with_position(snapshot(dec!(10_000), dec!(0)), Decimal::MAX);
        let order = limit(Side::Buy, dec!(1), dec!(1));
        let market = MarketContext::new(dec!(1), dec!(10_000));

        let decision = RiskManager::evaluate(&order, &snap, &market, &RiskLimits::default());
        assert!(matches!(
            decision,
            RiskDecision::Reject(RejectReason::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_evaluate_is_pure() {
        let snap = with_position(snapshot(dec!(500), dec!(1)), dec!(2));
        let order = limit(Side::Buy, dec!(4), dec!(100));
        let market = MarketContext::new(dec!(100), dec!(800));
        let limits = RiskLimits::default();

        let snap_before = snap.clone();
        let order_before = order.clone();

        let first = RiskManager::evaluate(&order, &snap, &market, &limits);
        let second = RiskManager::evaluate(&order, &snap, &market, &limits);

        assert_eq!(first, second);
        assert_eq!(snap, snap_before);
        assert_eq!(order, order_before);
    }
}
