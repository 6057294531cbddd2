//! Trading Session
//!
//! Single entry point for terminal commands. Commands run one at a time;
//! background refresh may run alongside and only touches the tables through
//! the position and order managers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use tiller_clock::Clock;
use tiller_core::{Symbol, TieredOrderPlan};
use tiller_gateway::ExchangeGateway;
use tiller_order_manager::{OrderError, OrderManager, RiskContext, TierOutcome};
use tiller_position_manager::{PositionManager, StaleData};
use tiller_risk_manager::{PositionRisk, check_position_risk, max_quantity};
use tokio::sync::Mutex;

use crate::command::Command;
use crate::config::{ConfigError, SessionConfig};
use crate::context::{SessionContext, TradingMode};
use crate::display::{CommandOutcome, DisplayState, Feed, StaleFlags};
use crate::error::{Result, UserFacingError};

pub struct TradingSession {
    account: String,
    mode: TradingMode,
    config: SessionConfig,
    positions: PositionManager,
    orders: OrderManager,
    /// Held for the whole of a command, gateway calls included
    command_lock: Mutex<()>,
    /// Latest failure per feed; cleared by the next good refresh
    warnings: RwLock<BTreeMap<Feed, String>>,
    last_outcome: RwLock<Option<CommandOutcome>>,
    /// Set once local state is found corrupt
    halted: RwLock<Option<String>>,
}

impl TradingSession {
    pub fn new(
        account: impl Into<String>,
        mode: TradingMode,
        gateway: Arc<dyn ExchangeGateway>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let positions = PositionManager::new(gateway.clone(), clock.clone(), config.gateway_timeout());
        let orders = OrderManager::new(gateway, clock, config.order_manager_config());
        let account = account.into();
        info!("[SESSION] {} session for {} ready", mode_name(mode), account);

        Ok(Self {
            account,
            mode,
            config,
            positions,
            orders,
            command_lock: Mutex::new(()),
            warnings: RwLock::new(BTreeMap::new()),
            last_outcome: RwLock::new(None),
            halted: RwLock::new(None),
        })
    }

    /// Context for this session's account on the configured default symbol
    pub fn default_context(&self) -> std::result::Result<SessionContext, ConfigError> {
        Ok(SessionContext::new(
            self.config.default_symbol()?,
            self.account.clone(),
            self.mode,
        ))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn position_manager(&self) -> &PositionManager {
        &self.positions
    }

    pub fn order_manager(&self) -> &OrderManager {
        &self.orders
    }

    /// Why the session stopped accepting commands, if it did
    pub fn halted(&self) -> Option<String> {
        self.halted.read().clone()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Parse and run one line of terminal input
    pub async fn execute_line(&self, ctx: &SessionContext, line: &str) -> Result<DisplayState> {
        let command: Command = line.parse()?;
        self.execute(ctx, command).await
    }

    /// Run one command to completion and return the updated display state.
    ///
    /// Commands are serialized: a second caller waits until the first has
    /// finished, including its gateway calls.
    pub async fn execute(&self, ctx: &SessionContext, command: Command) -> Result<DisplayState> {
        self.check_context(ctx)?;
        let _guard = self.command_lock.lock().await;
        self.ensure_running()?;
        info!("[SESSION] {} {:?} on {}", ctx.account, command, ctx.symbol);

        let outcome = self.run(ctx, command).await.map_err(|e| self.escalate(e))?;
        *self.last_outcome.write() = Some(outcome);
        Ok(self.display_state(ctx))
    }

    /// Current state without calling the exchange
    pub fn get_display_state(&self, ctx: &SessionContext) -> Result<DisplayState> {
        self.check_context(ctx)?;
        Ok(self.display_state(ctx))
    }

    async fn run(&self, ctx: &SessionContext, command: Command) -> Result<CommandOutcome> {
        let symbol = &ctx.symbol;
        match command {
            Command::Market { side, quantity } => {
                let risk = self.risk_context(symbol).await;
                let order = self
                    .orders
                    .place_market_order(symbol, side, quantity, &risk)
                    .await?;
                self.refresh_account().await;
                Ok(CommandOutcome::Placed(order))
            }
            Command::Limit {
                side,
                quantity,
                price,
            } => {
                let risk = self.risk_context(symbol).await;
                let order = self
                    .orders
                    .place_limit_order(symbol, side, quantity, price, &risk)
                    .await?;
                self.refresh_account().await;
                Ok(CommandOutcome::Placed(order))
            }
            Command::Tiered {
                side,
                sizing,
                price_low,
                price_high,
                tier_count,
            } => {
                let plan = TieredOrderPlan {
                    symbol: symbol.clone(),
                    side,
                    sizing,
                    price_low,
                    price_high,
                    tier_count,
                };
                plan.validate().map_err(OrderError::from)?;
                let risk = self.risk_context(symbol).await;
                let report = self.orders.place_tiered_orders(&plan, &risk).await?;

                let mut placed = Vec::new();
                let mut failures = Vec::new();
                let mut first_error = None;
                for outcome in report.outcomes {
                    match outcome {
                        TierOutcome::Placed(order) => placed.push(order.id()),
                        TierOutcome::Failed { tier, error } => {
                            if matches!(error, OrderError::Invariant(_)) {
                                return Err(error.into());
                            }
                            let error = UserFacingError::from(error);
                            failures.push(format!("tier {} at {}: {}", tier.index + 1, tier.price, error));
                            first_error.get_or_insert(error);
                        }
                    }
                }
                self.refresh_account().await;

                match first_error {
                    Some(error) if placed.is_empty() => Err(error),
                    _ => Ok(CommandOutcome::Tiered { placed, failures }),
                }
            }
            Command::Cancel(order_id) => {
                let order = self.orders.cancel_order(order_id).await?;
                Ok(CommandOutcome::Cancelled(vec![order.id()]))
            }
            Command::CancelAll => {
                let report = self.orders.cancel_all_for_symbol(symbol).await?;
                Ok(CommandOutcome::Cancelled(report.cancelled))
            }
            Command::CancelRange {
                price_low,
                price_high,
            } => {
                let report = self
                    .orders
                    .cancel_orders_in_range(symbol, price_low, price_high)
                    .await?;
                Ok(CommandOutcome::Cancelled(report.cancelled))
            }
            Command::Refresh => {
                self.refresh_inner(ctx).await?;
                Ok(CommandOutcome::Refreshed)
            }
        }
    }

    /// Positions and balances are refreshed before every risk check, then
    /// copied once so the check and the submission see the same account.
    /// A failed refresh leaves the previous snapshot in place.
    async fn risk_context(&self, symbol: &Symbol) -> RiskContext {
        self.refresh_account().await;
        let prices = self
            .positions
            .refresh_prices(std::slice::from_ref(symbol))
            .await;
        self.record(Feed::Prices, prices);

        RiskContext::new(
            self.positions.snapshot(),
            self.config.risk_limits.clone(),
            symbol.quote(),
        )
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Pull balances, positions, prices and open orders.
    ///
    /// Failures are recorded as warnings and never clear existing data. Does
    /// not wait for a running command.
    pub async fn refresh(&self, ctx: &SessionContext) -> Result<StaleFlags> {
        self.check_context(ctx)?;
        self.ensure_running()?;
        self.refresh_inner(ctx).await.map_err(|e| self.escalate(e))?;
        Ok(self.stale_flags())
    }

    async fn refresh_inner(&self, ctx: &SessionContext) -> Result<()> {
        self.refresh_account().await;

        let mut symbols: BTreeSet<Symbol> = self
            .positions
            .positions()
            .into_iter()
            .map(|p| p.symbol)
            .collect();
        symbols.insert(ctx.symbol.clone());
        let symbols: Vec<Symbol> = symbols.into_iter().collect();
        let prices = self.positions.refresh_prices(&symbols).await;
        self.record(Feed::Prices, prices);

        match self.orders.refresh_open_orders(None).await {
            Ok(report) => {
                self.warnings.write().remove(&Feed::Orders);
                debug!("[SESSION] open orders reconciled: {:?}", report);
                Ok(())
            }
            Err(e @ OrderError::Invariant(_)) => Err(e.into()),
            Err(e) => {
                let message = format!("orders are stale: {}", UserFacingError::from(e));
                warn!("[SESSION] {}", message);
                self.warnings.write().insert(Feed::Orders, message);
                Ok(())
            }
        }
    }

    async fn refresh_account(&self) {
        let positions = self.positions.refresh_positions().await;
        self.record(Feed::Positions, positions);
        let balances = self.positions.refresh_balances().await;
        self.record(Feed::Balances, balances);
    }

    fn record<T>(&self, feed: Feed, result: std::result::Result<T, StaleData>) {
        let mut warnings = self.warnings.write();
        match result {
            Ok(_) => {
                warnings.remove(&feed);
            }
            Err(stale) => {
                warnings.insert(feed, stale.to_string());
            }
        }
    }

    // ========================================================================
    // Guards
    // ========================================================================

    fn check_context(&self, ctx: &SessionContext) -> Result<()> {
        if ctx.account != self.account || ctx.mode != self.mode {
            return Err(UserFacingError::Validation(format!(
                "context for {} ({}) does not belong to the {} session for {}",
                ctx.account,
                mode_name(ctx.mode),
                mode_name(self.mode),
                self.account
            )));
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        match self.halted.read().as_ref() {
            Some(reason) => Err(UserFacingError::Fatal(reason.clone())),
            None => Ok(()),
        }
    }

    /// A fatal error halts the session; everything else passes through
    fn escalate(&self, e: UserFacingError) -> UserFacingError {
        if let UserFacingError::Fatal(reason) = &e {
            error!(
                "[SESSION] local state is corrupt, refusing further commands: {}",
                reason
            );
            self.halted.write().get_or_insert_with(|| reason.clone());
        }
        e
    }

    // ========================================================================
    // Display
    // ========================================================================

    fn stale_flags(&self) -> StaleFlags {
        let tables = self.positions.staleness();
        StaleFlags {
            positions: tables.positions,
            balances: tables.balances,
            prices: tables.prices,
            orders: self.warnings.read().contains_key(&Feed::Orders),
        }
    }

    fn display_state(&self, ctx: &SessionContext) -> DisplayState {
        let mut warnings: Vec<String> = self.warnings.read().values().cloned().collect();
        if let Some(reason) = self.halted() {
            warnings.push(format!("session halted: {}", reason));
        }

        let portfolio_value = self.positions.portfolio_value(&self.config.quote_asset);
        let max_quantity = self
            .positions
            .price(&ctx.symbol)
            .map(|price| max_quantity(&self.config.risk_limits, price, Some(portfolio_value)));

        let positions = self.positions.positions();
        let position_risks: Vec<PositionRisk> = positions
            .iter()
            .filter(|p| !p.is_flat())
            .map(|p| check_position_risk(&self.config.risk_limits, p, portfolio_value))
            .collect();
        for risk in position_risks.iter().filter(|r| r.needs_attention) {
            if let Some(distance) = risk.liquidation_distance {
                warnings.push(format!(
                    "{} is {}% from liquidation",
                    risk.symbol,
                    distance.round_dp(2)
                ));
            }
        }

        DisplayState {
            symbol: ctx.symbol.clone(),
            positions,
            balances: self.positions.balances(),
            open_orders: self.orders.open_orders(None),
            last_prices: self.positions.last_prices().into_iter().collect(),
            warnings,
            stale: self.stale_flags(),
            summary: self.positions.summary(),
            position_risks,
            portfolio_value,
            max_quantity,
            last_outcome: self.last_outcome.read().clone(),
        }
    }
}

fn mode_name(mode: TradingMode) -> &'static str {
    match mode {
        TradingMode::Paper => "paper",
        TradingMode::Live => "live",
    }
}
