//! Tier generation
//!
//! Splits a [`TieredOrderPlan`] into concrete limit order levels. Pure: no
//! gateway, no risk, no state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Price, Quantity, TierSizing, TieredOrderPlan};
use tiller_gateway::MarketPrecision;

use crate::error::{OrderError, Result};

/// One level of a tiered plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Zero-based position from `price_low`
    pub index: u32,
    pub price: Price,
    pub quantity: Quantity,
}

/// Evenly spaced prices over `[low, high]` inclusive; the last tier is
/// exactly `high`, a single tier sits at `low`
pub fn tier_prices(low: Price, high: Price, count: u32) -> Vec<Price> {
    if count <= 1 {
        return vec![low];
    }
    let step = (high - low) / Decimal::from(count - 1);
    (0..count)
        .map(|i| {
            if i == count - 1 {
                high
            } else {
                low.checked_add(step * Decimal::from(i))
                    .map_or(high, |p| p.min(high))
            }
        })
        .collect()
}

/// Split `total` into `count` parts rounded down to the market's step; the
/// last part takes the remainder so the parts sum exactly to `total`
pub fn split_quantity(total: Quantity, count: u32, precision: &MarketPrecision) -> Vec<Quantity> {
    if count <= 1 {
        return vec![total];
    }
    let per_tier = precision.round_quantity(total / Decimal::from(count));
    let mut parts = vec![per_tier; (count - 1) as usize];
    parts.push(total - per_tier * Decimal::from(count - 1));
    parts
}

/// Generate every tier of `plan`.
///
/// Interior tier prices are rounded down to the market's tick, never below
/// `price_low`; the first and last tiers keep the prices as entered. Fails
/// when the plan is invalid or any tier would round down to zero.
pub fn generate_tiers(plan: &TieredOrderPlan, precision: &MarketPrecision) -> Result<Vec<Tier>> {
    plan.validate()?;
    let last = plan.tier_count.saturating_sub(1) as usize;
    let prices: Vec<Price> = tier_prices(plan.price_low, plan.price_high, plan.tier_count)
        .into_iter()
        .enumerate()
        .map(|(i, price)| {
            if i == 0 || i == last {
                price
            } else {
                precision.round_price(price).max(plan.price_low)
            }
        })
        .collect();

    let quantities = match plan.sizing {
        TierSizing::Quantity(total) => split_quantity(total, plan.tier_count, precision),
        TierSizing::Notional(total_value) => {
            let value_per_tier = total_value / Decimal::from(plan.tier_count);
            prices
                .iter()
                .map(|price| {
                    value_per_tier
                        .checked_div(*price)
                        .map(|q| precision.round_quantity(q))
                        .ok_or_else(|| {
                            OrderError::Validation(format!(
                                "tier value {} at {} is out of range",
                                value_per_tier, price
                            ))
                        })
                })
                .collect::<Result<Vec<Quantity>>>()?
        }
    };

    let tiers: Vec<Tier> = prices
        .into_iter()
        .zip(quantities)
        .enumerate()
        .map(|(i, (price, quantity))| Tier {
            index: i as u32,
            price,
            quantity,
        })
        .collect();

    if let Some(tier) = tiers.iter().find(|t| t.quantity <= Decimal::ZERO) {
        return Err(OrderError::Validation(format!(
            "tier {} at {} rounds to zero quantity; use fewer tiers or a larger total",
            tier.index + 1,
            tier.price
        )));
    }
    Ok(tiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tiller_core::{Side, Symbol};

    fn sol() -> Symbol {
        Symbol::new("SOL_USDC").unwrap()
    }

    fn six_decimals() -> MarketPrecision {
        MarketPrecision::from_decimals(2, 6)
    }

    #[test]
    fn test_prices_evenly_spaced() {
        assert_eq!(
            tier_prices(dec!(100), dec!(110), 6),
            vec![dec!(100), dec!(102), dec!(104), dec!(106), dec!(108), dec!(110)]
        );
        assert_eq!(tier_prices(dec!(100), dec!(110), 1), vec![dec!(100)]);
        assert_eq!(tier_prices(dec!(100), dec!(100), 3), vec![dec!(100); 3]);
    }

    #[test]
    fn test_last_price_exact_with_repeating_step() {
        let prices = tier_prices(dec!(100), dec!(101), 4);
        assert_eq!(prices.len(), 4);
        assert_eq!(prices[3], dec!(101));
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_quantities_sum_exactly() {
        let parts = split_quantity(dec!(1.0), 3, &six_decimals());
        assert_eq!(parts, vec![dec!(0.333333), dec!(0.333333), dec!(0.333334)]);
        assert_eq!(parts.iter().sum::<Decimal>(), dec!(1.0));

        for n in 1..=12u32 {
            let total = dec!(7.123457);
            let parts = split_quantity(total, n, &six_decimals());
            assert_eq!(parts.len(), n as usize);
            assert_eq!(parts.iter().sum::<Decimal>(), total);
        }
    }

    #[test]
    fn test_generate_by_quantity() {
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Buy, dec!(3), dec!(100), dec!(110), 6);
        let tiers = generate_tiers(&plan, &six_decimals()).unwrap();
        assert_eq!(tiers.len(), 6);
        assert_eq!(tiers[0].quantity, dec!(0.5));
        assert_eq!(tiers[5].price, dec!(110));
        assert_eq!(tiers.iter().map(|t| t.quantity).sum::<Decimal>(), dec!(3));
    }

    #[test]
    fn test_generate_by_notional() {
        // 300 split in 3: 100 per tier at 100 / 105 / 110
        let plan = TieredOrderPlan::by_notional(sol(), Side::Buy, dec!(300), dec!(100), dec!(110), 3);
        let tiers = generate_tiers(&plan, &six_decimals()).unwrap();
        assert_eq!(tiers[0].quantity, dec!(1));
        assert_eq!(tiers[1].quantity, dec!(0.952380));
        assert_eq!(tiers[2].quantity, dec!(0.909090));
    }

    #[test]
    fn test_interior_prices_snap_to_tick() {
        // 100 + 10/3 would otherwise carry 28 digits
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Buy, dec!(1), dec!(100), dec!(110), 4);
        let tiers = generate_tiers(&plan, &MarketPrecision::new(dec!(0.05), dec!(0.01))).unwrap();
        let prices: Vec<Decimal> = tiers.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![dec!(100), dec!(103.3), dec!(106.65), dec!(110)]);
        let quantities: Vec<Decimal> = tiers.iter().map(|t| t.quantity).collect();
        assert_eq!(quantities, vec![dec!(0.25), dec!(0.25), dec!(0.25), dec!(0.25)]);
    }

    #[test]
    fn test_entered_bounds_kept_exactly() {
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Sell, dec!(3), dec!(100.013), dec!(100.027), 3);
        let tiers = generate_tiers(&plan, &MarketPrecision::new(dec!(0.01), dec!(0.1))).unwrap();
        assert_eq!(tiers[0].price, dec!(100.013));
        // 100.02 snapped down, still inside the range
        assert_eq!(tiers[1].price, dec!(100.02));
        assert_eq!(tiers[2].price, dec!(100.027));
        assert_eq!(tiers.iter().map(|t| t.quantity).sum::<Decimal>(), dec!(3));
    }

    #[test]
    fn test_notional_tiers_round_to_step() {
        let plan = TieredOrderPlan::by_notional(sol(), Side::Buy, dec!(300), dec!(100), dec!(110), 3);
        let tiers = generate_tiers(&plan, &MarketPrecision::new(dec!(0.01), dec!(0.01))).unwrap();
        let quantities: Vec<Decimal> = tiers.iter().map(|t| t.quantity).collect();
        assert_eq!(quantities, vec![dec!(1), dec!(0.95), dec!(0.9)]);
    }

    #[test]
    fn test_too_many_tiers_rejected_before_generation() {
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Buy, dec!(1), dec!(100), dec!(110), u32::MAX);
        assert!(matches!(
            generate_tiers(&plan, &six_decimals()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_tier_quantity_rejected() {
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Sell, dec!(0.000002), dec!(100), dec!(110), 5);
        assert!(matches!(generate_tiers(&plan, &six_decimals()), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_invalid_plan_rejected() {
        let plan = TieredOrderPlan::by_quantity(sol(), Side::Buy, dec!(1), dec!(110), dec!(100), 3);
        assert!(matches!(generate_tiers(&plan, &six_decimals()), Err(OrderError::Validation(_))));
    }
}
