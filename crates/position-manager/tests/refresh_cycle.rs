//! Position Manager against fills on the paper exchange
//!
//! Trades go straight to the exchange; the manager only learns about them
//! through refresh, as it would for fills from another terminal.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tiller_clock::ManualClock;
use tiller_core::{Side, Symbol};
use tiller_gateway::{ExchangeGateway, OrderRequest, PaperExchange};
use tiller_position_manager::{PositionManager, Table, unrealized_pnl};

fn sol() -> Symbol {
    Symbol::new("SOL_USDC").unwrap()
}

fn jup() -> Symbol {
    Symbol::new("JUP_USDC").unwrap()
}

#[tokio::test]
async fn test_fills_flow_into_positions_and_summary() {
    let _ = env_logger::try_init();
    let exchange = Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_price(&jup(), dec!(1))
            .with_balance("USDC", dec!(10_000)),
    );
    let clock = Arc::new(ManualClock::default());
    let manager = PositionManager::new(exchange.clone(), clock.clone(), Duration::from_secs(1));

    // Long 3 SOL at 100, short 500 JUP at 1
    exchange
        .place_order(&OrderRequest::market("m-1", sol(), Side::Buy, dec!(3)))
        .await
        .unwrap();
    // Shorts need margin the paper account does not model; open it directly
    exchange.set_position(&jup(), dec!(-500), dec!(1));
    exchange.set_position_margin(&jup(), dec!(60), Some(dec!(1.5)));

    manager.refresh_positions().await.unwrap();
    manager.refresh_balances().await.unwrap();
    let first_refresh = manager.refreshed_at(Table::Positions).unwrap();

    // Market moves: SOL up, JUP up (short loses)
    exchange.set_price(&sol(), dec!(110));
    exchange.set_price(&jup(), dec!(1.2));
    clock.advance(chrono::Duration::seconds(5));
    manager.refresh_prices(&[sol(), jup()]).await.unwrap();

    let sol_pos = manager.position(&sol()).unwrap();
    assert_eq!(sol_pos.unrealized_pnl, dec!(30));
    assert_eq!(unrealized_pnl(&sol_pos, dec!(90)), dec!(-30));
    assert_eq!(manager.position(&jup()).unwrap().unrealized_pnl, dec!(-100));

    let summary = manager.summary();
    assert_eq!(summary.total_positions, 2);
    assert_eq!(summary.long_positions, 1);
    assert_eq!(summary.short_positions, 1);
    assert_eq!(summary.winning_positions, 1);
    assert_eq!(summary.losing_positions, 1);
    assert_eq!(summary.total_unrealized_pnl, dec!(-70));
    assert_eq!(summary.total_margin, dec!(60));
    assert_eq!(manager.total_margin(), dec!(60));

    // Short at 1.2 liquidates at 1.5: 25% away
    assert_eq!(manager.position(&jup()).unwrap().liquidation_distance(), Some(dec!(25)));

    // 9700 USDC left + 3 SOL at 110
    assert_eq!(manager.portfolio_value("USDC"), dec!(10_030));

    // Closing the SOL long removes it on the next refresh
    exchange
        .place_order(&OrderRequest::market("m-3", sol(), Side::Sell, dec!(3)))
        .await
        .unwrap();
    manager.refresh_positions().await.unwrap();
    assert!(manager.position(&sol()).is_none());
    assert_eq!(manager.positions().len(), 1);
    assert!(manager.refreshed_at(Table::Positions).unwrap() > first_refresh);
}
