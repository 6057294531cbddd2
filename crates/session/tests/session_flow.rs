//! Trading Session end to end against the paper exchange
//!
//! Covers:
//! 1. Concurrent commands are serialized (second sees the first's effect)
//! 2. A submission timeout is resolved by the next refresh
//! 3. Background refresh keeps the display current and stops on shutdown
//! 4. Stale-but-valid positions survive a failed poll
//! 5. Paper and live sessions do not share state

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tiller_clock::ManualClock;
use tiller_core::{OrderStatus, Side, Symbol};
use tiller_gateway::{
    ExchangeGateway, GatewayError, GatewayErrorKind, GatewayOp, OrderRequest, PaperExchange,
};
use tiller_risk_manager::{RejectReason, RiskLimits};
use tiller_session::{
    Command, CommandOutcome, RefreshTask, SessionConfig, SessionContext, TradingMode,
    TradingSession, UserFacingError,
};

fn sol() -> Symbol {
    Symbol::new("SOL_USDC").unwrap()
}

fn config() -> SessionConfig {
    SessionConfig {
        risk_limits: RiskLimits::new(dec!(10_000), dec!(100)),
        gateway_timeout_ms: 1000,
        ..SessionConfig::default()
    }
}

fn paper(usdc: rust_decimal::Decimal) -> Arc<PaperExchange> {
    Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_balance("USDC", usdc)
            .with_closed_orders_reported(true),
    )
}

fn session_on(
    exchange: Arc<PaperExchange>,
    mode: TradingMode,
) -> (Arc<TradingSession>, SessionContext) {
    let session = TradingSession::new(
        "desk-1",
        mode,
        exchange,
        Arc::new(ManualClock::default()),
        config(),
    )
    .unwrap();
    let ctx = session.default_context().unwrap();
    (Arc::new(session), ctx)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_commands_are_serialized() {
    let _ = env_logger::try_init();
    // Room for exactly one 1 SOL @ 100 buy
    let exchange = paper(dec!(150));
    exchange.set_latency(GatewayOp::PlaceOrder, Duration::from_millis(200));
    let (session, ctx) = session_on(exchange.clone(), TradingMode::Paper);

    let first = {
        let (session, ctx) = (session.clone(), ctx.clone());
        tokio::spawn(async move { session.execute_line(&ctx, "l 1@100").await })
    };
    let second = {
        let (session, ctx) = (session.clone(), ctx.clone());
        tokio::spawn(async move { session.execute_line(&ctx, "l 1@100").await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    // The second command saw the funds the first one locked, so the risk
    // check caught it before the exchange did
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(UserFacingError::RiskRejected(RejectReason::InsufficientFunds { .. }))
    )));
    assert_eq!(exchange.call_count(GatewayOp::PlaceOrder), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_timeout_resolved_by_refresh() {
    let exchange = paper(dec!(5000));
    exchange.set_latency(GatewayOp::PlaceOrder, Duration::from_secs(30));
    let (session, ctx) = session_on(exchange.clone(), TradingMode::Paper);

    let err = session.execute_line(&ctx, "l 1@95").await.unwrap_err();
    assert!(matches!(
        err,
        UserFacingError::Gateway {
            kind: GatewayErrorKind::Timeout,
            ..
        }
    ));

    let state = session.get_display_state(&ctx).unwrap();
    assert_eq!(state.open_orders.len(), 1);
    assert_eq!(state.open_orders[0].status(), OrderStatus::Unknown);

    // The exchange did take the order; the next refresh finds it
    exchange.set_latency(GatewayOp::PlaceOrder, Duration::ZERO);
    let state = session.execute(&ctx, Command::Refresh).await.unwrap();
    assert_eq!(state.open_orders.len(), 1);
    assert_eq!(state.open_orders[0].status(), OrderStatus::Open);
    assert!(state.open_orders[0].exchange_order_id().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_tracks_exchange() {
    let exchange = paper(dec!(5000));
    let (session, ctx) = session_on(exchange.clone(), TradingMode::Paper);
    let task = RefreshTask::spawn_every(session.clone(), ctx.clone(), Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        session.get_display_state(&ctx).unwrap().current_price(),
        Some(dec!(100))
    );

    // Price move and an order placed from another terminal
    exchange.set_price(&sol(), dec!(120));
    exchange
        .place_order(&OrderRequest::limit("web-7", sol(), Side::Buy, dec!(2), dec!(110)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let state = session.get_display_state(&ctx).unwrap();
    assert_eq!(state.current_price(), Some(dec!(120)));
    assert_eq!(state.open_orders.len(), 1);
    assert_eq!(state.open_orders[0].price, Some(dec!(110)));
    assert!(!state.stale.any());

    assert!(task.is_running());
    task.shutdown().await;

    let polls = exchange.call_count(GatewayOp::OpenOrders);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(exchange.call_count(GatewayOp::OpenOrders), polls);
}

#[tokio::test]
async fn test_failed_poll_keeps_positions() {
    let exchange = paper(dec!(5000));
    let btc = Symbol::new("BTC_USDC").unwrap();
    exchange.set_price(&btc, dec!(52_000));
    exchange.set_position(&sol(), dec!(2), dec!(90));
    exchange.set_position(&btc, dec!(0.1), dec!(50_000));
    let (session, ctx) = session_on(exchange.clone(), TradingMode::Paper);

    let state = session.execute(&ctx, Command::Refresh).await.unwrap();
    assert_eq!(state.positions.len(), 2);

    exchange.fail_next(
        GatewayOp::Positions,
        GatewayError::Network("connection reset".into()),
    );
    let state = session.execute(&ctx, Command::Refresh).await.unwrap();

    assert_eq!(state.positions.len(), 2);
    assert!(state.stale.positions);
    assert!(state.warnings.iter().any(|w| w.starts_with("positions are stale")));
    assert_eq!(state.last_outcome, Some(CommandOutcome::Refreshed));

    let state = session.execute(&ctx, Command::Refresh).await.unwrap();
    assert!(!state.stale.positions);
    assert!(state.warnings.is_empty());
}

#[tokio::test]
async fn test_paper_and_live_sessions_are_isolated() {
    let (paper_session, paper_ctx) = session_on(paper(dec!(5000)), TradingMode::Paper);
    let (live_session, live_ctx) = session_on(paper(dec!(5000)), TradingMode::Live);

    paper_session.execute_line(&paper_ctx, "l 1@90").await.unwrap();

    assert_eq!(
        paper_session.get_display_state(&paper_ctx).unwrap().open_orders.len(),
        1
    );
    assert!(live_session.get_display_state(&live_ctx).unwrap().open_orders.is_empty());
    assert!(live_session.execute_line(&paper_ctx, "c").await.is_err());
}
