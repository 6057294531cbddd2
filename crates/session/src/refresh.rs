//! Background refresh loop

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::context::SessionContext;
use crate::session::TradingSession;

/// Polls balances, positions, prices and open orders on a fixed interval
/// until shut down or the session halts.
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Start polling every `refresh_interval_ms` from the session config
    pub fn spawn(session: Arc<TradingSession>, ctx: SessionContext) -> Self {
        let period = session.config().refresh_interval();
        Self::spawn_every(session, ctx, period)
    }

    pub fn spawn_every(session: Arc<TradingSession>, ctx: SessionContext, period: Duration) -> Self {
        info!("[REFRESH] polling {} every {:?}", ctx.symbol, period);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match session.refresh(&ctx).await {
                    Ok(stale) if stale.any() => debug!("[REFRESH] showing stale data: {:?}", stale),
                    Ok(_) => {}
                    // Refresh failures are warnings; an error means the
                    // session refused the context or has halted
                    Err(e) => {
                        error!("[REFRESH] stopping: {}", e);
                        break;
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop polling. An in-flight refresh is dropped at its next await.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
        info!("[REFRESH] stopped");
    }
}
