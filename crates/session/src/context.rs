use serde::{Deserialize, Serialize};
use tiller_core::Symbol;

/// Whether orders reach a real exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingMode {
    Paper,
    Live,
}

/// Who a command is issued for and which market it targets.
///
/// Passed explicitly to every session call; a session only accepts contexts
/// for its own account and mode, so paper and live sessions can run side by
/// side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    pub symbol: Symbol,
    pub account: String,
    pub mode: TradingMode,
}

impl SessionContext {
    pub fn new(symbol: Symbol, account: impl Into<String>, mode: TradingMode) -> Self {
        Self {
            symbol,
            account: account.into(),
            mode,
        }
    }

    /// Same account and mode, different market
    pub fn with_symbol(&self, symbol: Symbol) -> Self {
        Self {
            symbol,
            ..self.clone()
        }
    }
}
