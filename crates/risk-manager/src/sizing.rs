//! Position sizing and exit levels
//!
//! Stateless helpers the terminal uses to suggest order sizes and
//! stop/target prices. Percentages are expressed as 0-100.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tiller_core::{Position, Price, Quantity, Side, Symbol};

use crate::limits::RiskLimits;

/// Assumed price risk when no stop loss is given (2% of entry)
const DEFAULT_PRICE_RISK: Decimal = dec!(0.02);

/// A position above this many per-trade budgets of the portfolio is high risk
const HIGH_RISK_MULTIPLE: Decimal = dec!(3);

/// Liquidation closer than this, in percent of mark, needs attention
const LIQUIDATION_ALERT_PCT: Decimal = dec!(10);

/// Suggested position size in base units.
///
/// Risks `risk_amount` (or the per-trade share of `portfolio_value`) over the
/// distance to `stop_loss`, or over a 2% move when no stop is set. The result
/// is capped at `max_position_size / entry_price`.
pub fn position_size(
    limits: &RiskLimits,
    portfolio_value: Decimal,
    entry_price: Price,
    stop_loss: Option<Price>,
    risk_amount: Option<Decimal>,
) -> Quantity {
    if entry_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let risk_amount = risk_amount.unwrap_or_else(|| limits.risk_budget(portfolio_value));

    let size = match stop_loss.filter(|s| *s > Decimal::ZERO) {
        Some(stop) => {
            let price_risk = (entry_price - stop).abs();
            if price_risk.is_zero() {
                Decimal::ZERO
            } else {
                risk_amount.checked_div(price_risk).unwrap_or(Decimal::MAX)
            }
        }
        None => risk_amount
            .checked_div(entry_price * DEFAULT_PRICE_RISK)
            .unwrap_or(Decimal::MAX),
    };

    size.min(
        limits
            .max_position_size
            .checked_div(entry_price)
            .unwrap_or(Decimal::MAX),
    )
}

/// Stop price `percentage`% against the position (defaults to the per-trade
/// risk percentage)
pub fn stop_loss_price(
    limits: &RiskLimits,
    entry_price: Price,
    side: Side,
    percentage: Option<Decimal>,
) -> Price {
    let pct = percentage.unwrap_or(limits.risk_percentage_per_trade) / Decimal::ONE_HUNDRED;
    match side {
        Side::Buy => entry_price * (Decimal::ONE - pct),
        Side::Sell => entry_price * (Decimal::ONE + pct),
    }
}

/// Target price `risk_reward` times the default stop distance in the
/// position's favour
pub fn take_profit_price(
    limits: &RiskLimits,
    entry_price: Price,
    side: Side,
    risk_reward: Decimal,
) -> Price {
    let stop = stop_loss_price(limits, entry_price, side, None);
    let reward = (entry_price - stop).abs() * risk_reward;
    match side {
        Side::Buy => entry_price + reward,
        Side::Sell => entry_price - reward,
    }
}

/// Largest quantity allowed at `price`; tighter of the position limit and
/// (when a portfolio value is known) the risk budget over a 2% stop
pub fn max_quantity(limits: &RiskLimits, price: Price, portfolio_value: Option<Decimal>) -> Quantity {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let by_size = limits
        .max_position_size
        .checked_div(price)
        .unwrap_or(Decimal::MAX);

    match portfolio_value.filter(|v| *v > Decimal::ZERO) {
        Some(value) => match limits.risk_budget(value).checked_div(price * DEFAULT_PRICE_RISK) {
            Some(by_risk) => by_size.min(by_risk),
            None => by_size,
        },
        None => by_size,
    }
}

/// Exit trigger that fired for a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss { mark_price: Price },
    TakeProfit { mark_price: Price },
}

/// Check stop loss first, then take profit, against the position's mark
pub fn should_close(
    position: &Position,
    stop_loss: Option<Price>,
    take_profit: Option<Price>,
) -> Option<CloseReason> {
    let mark = position.mark_price;
    let long = position.is_long();
    let short = position.is_short();

    if let Some(stop) = stop_loss {
        if (long && mark <= stop) || (short && mark >= stop) {
            return Some(CloseReason::StopLoss { mark_price: mark });
        }
    }
    if let Some(target) = take_profit {
        if (long && mark >= target) || (short && mark <= target) {
            return Some(CloseReason::TakeProfit { mark_price: mark });
        }
    }
    None
}

/// Risk metrics for one open position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRisk {
    pub symbol: Symbol,
    /// Notional as a percentage of portfolio value; `None` while the
    /// portfolio value is unknown
    pub size_percentage: Option<Decimal>,
    pub pnl_percentage: Decimal,
    /// Percent of mark until liquidation
    pub liquidation_distance: Option<Decimal>,
    /// Size above three per-trade budgets
    pub is_high_risk: bool,
    /// Liquidation within 10% of mark
    pub needs_attention: bool,
}

/// Size, PnL and liquidation metrics for `position` against the portfolio
pub fn check_position_risk(
    limits: &RiskLimits,
    position: &Position,
    portfolio_value: Decimal,
) -> PositionRisk {
    let size_percentage = (portfolio_value > Decimal::ZERO)
        .then(|| {
            position
                .notional()
                .checked_div(portfolio_value)
                .map_or(Decimal::MAX, |ratio| ratio.saturating_mul(Decimal::ONE_HUNDRED))
        });
    let liquidation_distance = position.liquidation_distance();
    let high_risk_threshold = limits
        .risk_percentage_per_trade
        .saturating_mul(HIGH_RISK_MULTIPLE);

    PositionRisk {
        symbol: position.symbol.clone(),
        size_percentage,
        pnl_percentage: position.pnl_percentage(),
        liquidation_distance,
        is_high_risk: size_percentage.is_some_and(|pct| pct > high_risk_threshold),
        needs_attention: liquidation_distance.is_some_and(|d| d < LIQUIDATION_ALERT_PCT),
    }
}
