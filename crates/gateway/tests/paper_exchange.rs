//! Integration test: core-facing port <-> paper exchange
//!
//! Drives the paper adapter only through `Arc<dyn ExchangeGateway>` and the
//! bounded-wait helper, the way the managers use it.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tiller_core::{Side, Symbol};
use tiller_gateway::{
    ExchangeGateway, GatewayError, GatewayErrorKind, GatewayOp, MarketFillPolicy, OrderRequest,
    PaperExchange, RemoteOrderStatus, with_deadline,
};

fn sol() -> Symbol {
    Symbol::new("SOL_USDC").unwrap()
}

#[tokio::test]
async fn test_limit_order_lifecycle_through_port() {
    let _ = env_logger::try_init();
    let paper = Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_balance("USDC", dec!(1000))
            .with_closed_orders_reported(true),
    );
    let gateway: Arc<dyn ExchangeGateway> = paper.clone();

    // === Place ===
    let request = OrderRequest::limit("local-1", sol(), Side::Buy, dec!(2), dec!(95));
    let ack = with_deadline(Duration::from_secs(1), gateway.place_order(&request))
        .await
        .unwrap();
    assert_eq!(ack.status, RemoteOrderStatus::New);

    let listed = gateway.get_open_orders(Some(&sol())).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].client_order_id.as_deref(), Some("local-1"));
    assert_eq!(listed[0].price, Some(dec!(95)));

    let usdc = gateway
        .get_balances()
        .await
        .unwrap()
        .into_iter()
        .find(|b| b.asset == "USDC")
        .unwrap();
    assert_eq!(usdc.available, dec!(810));
    assert_eq!(usdc.locked, dec!(190));

    // === Fill in two steps ===
    paper.fill_order(&ack.exchange_order_id, dec!(0.5)).unwrap();
    let listed = gateway.get_open_orders(None).await.unwrap();
    assert_eq!(listed[0].status, RemoteOrderStatus::PartiallyFilled);
    assert_eq!(listed[0].filled_quantity, dec!(0.5));

    paper.fill_order(&ack.exchange_order_id, dec!(5)).unwrap();
    let listed = gateway.get_open_orders(None).await.unwrap();
    assert_eq!(listed[0].status, RemoteOrderStatus::Filled);
    assert_eq!(listed[0].filled_quantity, dec!(2));
    assert!(listed[0].updated_at.is_some());

    let positions = gateway.get_positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, dec!(2));
    assert_eq!(positions[0].entry_price, dec!(95));
    assert_eq!(positions[0].mark_price, Some(dec!(100)));

    // Filled orders cannot be cancelled
    let err = gateway
        .cancel_order(&sol(), &ack.exchange_order_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), GatewayErrorKind::ExchangeRejected);
}

#[tokio::test]
async fn test_partial_market_fill_policy() {
    let paper = Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_balance("USDC", dec!(1000))
            .with_market_fill(MarketFillPolicy::Partial(dec!(0.25))),
    );
    let gateway: Arc<dyn ExchangeGateway> = paper.clone();

    let ack = gateway
        .place_order(&OrderRequest::market("m-1", sol(), Side::Buy, dec!(4)))
        .await
        .unwrap();
    assert_eq!(ack.status, RemoteOrderStatus::PartiallyFilled);
    assert_eq!(ack.filled_quantity, dec!(1));
    assert_eq!(gateway.get_open_orders(None).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_leaves_effect_behind() {
    let paper = Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_balance("USDC", dec!(1000)),
    );
    paper.set_latency(GatewayOp::PlaceOrder, Duration::from_secs(30));
    let gateway: Arc<dyn ExchangeGateway> = paper.clone();

    let request = OrderRequest::limit("slow-1", sol(), Side::Buy, dec!(1), dec!(90));
    let err = with_deadline(Duration::from_secs(2), gateway.place_order(&request))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Timeout(Duration::from_secs(2)));

    // The exchange acted even though the caller gave up
    let listed = gateway.get_open_orders(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].client_order_id.as_deref(), Some("slow-1"));
    assert_eq!(paper.call_count(GatewayOp::PlaceOrder), 1);
}

#[tokio::test]
async fn test_bulk_cancels() {
    let paper = Arc::new(
        PaperExchange::new()
            .with_price(&sol(), dec!(100))
            .with_balance("SOL", dec!(10)),
    );
    let gateway: Arc<dyn ExchangeGateway> = paper.clone();

    for (i, price) in [dec!(101), dec!(105), dec!(110)].into_iter().enumerate() {
        gateway
            .place_order(&OrderRequest::limit(format!("s-{}", i), sol(), Side::Sell, dec!(1), price))
            .await
            .unwrap();
    }
    assert_eq!(paper.balance("SOL").unwrap().locked, dec!(3));

    gateway
        .cancel_orders_in_range(&sol(), dec!(104), dec!(111))
        .await
        .unwrap();
    let listed = gateway.get_open_orders(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].price, Some(dec!(101)));

    gateway.cancel_all_orders(&sol()).await.unwrap();
    assert!(gateway.get_open_orders(None).await.unwrap().is_empty());
    assert_eq!(paper.balance("SOL").unwrap().available, dec!(10));
}
