//! Tiller Trading Session
//!
//! Coordinates the execution core behind one entry point per terminal
//! command.
//!
//! ## Architecture
//!
//! ```text
//!   terminal input ──parse──► Command
//!                               │
//!                    ┌──────────▼───────────┐
//!                    │    TradingSession    │  one command at a time
//!                    │  (SessionContext in) │
//!                    └───┬──────────────┬───┘
//!        refresh first   │              │  place / cancel / reconcile
//!              ┌─────────▼───────┐  ┌───▼──────────┐
//!              │ PositionManager │  │ OrderManager │──► RiskManager (pure)
//!              └─────────┬───────┘  └───┬──────────┘
//!                        └──────┬───────┘
//!                               ▼
//!                        ExchangeGateway
//!
//!   RefreshTask ──interval──► TradingSession::refresh (runs beside commands)
//! ```
//!
//! Every command returns a [`DisplayState`] or a [`UserFacingError`]. Only
//! [`UserFacingError::Fatal`] ends a session; stale data is reported as a
//! warning on the display state.

pub mod command;
pub mod config;
pub mod context;
pub mod display;
pub mod error;
pub mod refresh;
pub mod session;

pub use command::{Command, ParseCommandError};
pub use config::{ConfigError, SessionConfig, load_config, load_config_from_str};
pub use context::{SessionContext, TradingMode};
pub use display::{CommandOutcome, DisplayState, Feed, StaleFlags};
pub use error::{Result, UserFacingError};
pub use refresh::RefreshTask;
pub use session::TradingSession;
