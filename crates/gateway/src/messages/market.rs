//! Market metadata

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Price, Quantity};

/// Finest scale a decimal can carry
const MAX_DECIMALS: u32 = 28;

/// Price and quantity increments an exchange accepts for one market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrecision {
    pub tick_size: Price,
    pub step_size: Quantity,
}

impl MarketPrecision {
    pub fn new(tick_size: Price, step_size: Quantity) -> Self {
        Self {
            tick_size,
            step_size,
        }
    }

    /// Increments of `10^-price_decimals` and `10^-quantity_decimals`
    pub fn from_decimals(price_decimals: u32, quantity_decimals: u32) -> Self {
        Self {
            tick_size: Decimal::new(1, price_decimals.min(MAX_DECIMALS)),
            step_size: Decimal::new(1, quantity_decimals.min(MAX_DECIMALS)),
        }
    }

    /// Round down to a whole number of ticks
    pub fn round_price(&self, price: Price) -> Price {
        round_down(price, self.tick_size)
    }

    /// Round down to a whole number of steps
    pub fn round_quantity(&self, quantity: Quantity) -> Quantity {
        round_down(quantity, self.step_size)
    }
}

impl Default for MarketPrecision {
    fn default() -> Self {
        Self::from_decimals(2, 2)
    }
}

/// Largest multiple of `increment` not above `value`. A non-positive
/// increment leaves the value as is.
fn round_down(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    match value.checked_div(increment) {
        Some(units) => (units.floor() * increment).normalize(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounds_down_to_increment() {
        let precision = MarketPrecision::new(dec!(0.05), dec!(0.001));
        assert_eq!(precision.round_price(dec!(103.3333)), dec!(103.3));
        assert_eq!(precision.round_price(dec!(103.35)), dec!(103.35));
        assert_eq!(precision.round_quantity(dec!(0.33339)), dec!(0.333));
        assert_eq!(precision.round_quantity(dec!(0.0009)), dec!(0));
    }

    #[test]
    fn test_from_decimals() {
        let precision = MarketPrecision::from_decimals(2, 6);
        assert_eq!(precision.tick_size, dec!(0.01));
        assert_eq!(precision.step_size, dec!(0.000001));
        assert_eq!(precision.round_quantity(dec!(1) / dec!(3)), dec!(0.333333));
        assert_eq!(MarketPrecision::default().tick_size, dec!(0.01));
    }

    #[test]
    fn test_extreme_values_left_alone() {
        let precision = MarketPrecision::new(dec!(0.0000001), dec!(0.0000001));
        assert_eq!(precision.round_quantity(Decimal::MAX), Decimal::MAX);
        assert_eq!(MarketPrecision::new(dec!(0), dec!(0)).round_price(dec!(1.234)), dec!(1.234));
    }
}
