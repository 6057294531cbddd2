use std::time::Duration;

use tiller_gateway::MarketPrecision;

/// Order manager settings
#[derive(Debug, Clone)]
pub struct OrderManagerConfig {
    /// Tick size `10^-price_decimals` when the exchange reports none
    pub price_decimals: u32,
    /// Step size `10^-quantity_decimals` when the exchange reports none
    pub quantity_decimals: u32,
    /// Bounded wait on every gateway call
    pub gateway_timeout: Duration,
}

impl OrderManagerConfig {
    pub fn fallback_precision(&self) -> MarketPrecision {
        MarketPrecision::from_decimals(self.price_decimals, self.quantity_decimals)
    }
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            price_decimals: 2,
            quantity_decimals: 6,
            gateway_timeout: Duration::from_secs(10),
        }
    }
}
