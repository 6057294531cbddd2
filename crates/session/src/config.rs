//! Session configuration
//!
//! Values only; the JSON loader is a convenience for the terminal binary.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiller_core::Symbol;
use tiller_order_manager::OrderManagerConfig;
use tiller_risk_manager::RiskLimits;

/// Finest decimal scale a price or quantity can carry
const MAX_DECIMALS: u32 = 28;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid default symbol '{0}': expected BASE_QUOTE")]
    InvalidSymbol(String),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub risk_limits: RiskLimits,
    pub default_symbol: String,
    /// Currency the portfolio is valued in
    pub quote_asset: String,
    pub refresh_interval_ms: u64,
    pub gateway_timeout_ms: u64,
    /// Tick and step used when the exchange reports no market precision
    pub price_decimals: u32,
    pub quantity_decimals: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            risk_limits: RiskLimits::default(),
            default_symbol: "SOL_USDC".to_string(),
            quote_asset: "USDC".to_string(),
            refresh_interval_ms: 5000,
            gateway_timeout_ms: 10_000,
            price_decimals: 2,
            quantity_decimals: 6,
        }
    }
}

/// Load session configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SessionConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string; missing fields take defaults
pub fn load_config_from_str(json: &str) -> Result<SessionConfig, ConfigError> {
    let config: SessionConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

impl SessionConfig {
    pub fn default_symbol(&self) -> Result<Symbol, ConfigError> {
        Symbol::new(&self.default_symbol)
            .map_err(|_| ConfigError::InvalidSymbol(self.default_symbol.clone()))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn order_manager_config(&self) -> OrderManagerConfig {
        OrderManagerConfig {
            price_decimals: self.price_decimals,
            quantity_decimals: self.quantity_decimals,
            gateway_timeout: self.gateway_timeout(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.risk_limits;
        if limits.max_position_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "risk_limits.max_position_size",
                reason: format!("must be positive, got {}", limits.max_position_size),
            });
        }
        let pct = limits.risk_percentage_per_trade;
        if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidValue {
                field: "risk_limits.risk_percentage_per_trade",
                reason: format!("must be in (0, 100], got {}", pct),
            });
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gateway_timeout_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        for (field, decimals) in [
            ("price_decimals", self.price_decimals),
            ("quantity_decimals", self.quantity_decimals),
        ] {
            if decimals > MAX_DECIMALS {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("must be at most {}, got {}", MAX_DECIMALS, decimals),
                });
            }
        }
        if self.quote_asset.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "quote_asset",
                reason: "must not be empty".to_string(),
            });
        }
        self.default_symbol()?;
        Ok(())
    }
}
