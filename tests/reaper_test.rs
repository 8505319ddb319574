mod common;

use common::*;
use fvgbot::config::ReaperConfig;
use fvgbot::execution::{BotStatus, Controller, ReapReport, StaleOrderReaper};
use fvgbot::models::{OrderStatus, OrderType, Side, SizeUnit, StopOrderType};
use fvgbot::BotError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NOW_MS: i64 = 10_000_000;

fn scenario() -> ScriptedExchange {
    let partial = fvgbot::models::OpenOrder {
        cum_exec_qty: dec("0.2"),
        ..open_order("partial", Side::Buy, OrderStatus::PartiallyFilled, StopOrderType::None)
    };
    let fresh = fvgbot::models::OpenOrder {
        created_at_ms: NOW_MS - 1_000,
        ..open_order("fresh", Side::Buy, OrderStatus::New, StopOrderType::None)
    };

    ScriptedExchange::new()
        .with_open_order(open_order("tp-sl", Side::Sell, OrderStatus::Untriggered, StopOrderType::BidirectionalTpsl))
        .with_open_order(open_order("unfilled", Side::Buy, OrderStatus::New, StopOrderType::None))
        .with_open_order(open_order("unfilled", Side::Buy, OrderStatus::New, StopOrderType::None))
        .with_open_order(partial)
        .with_open_order(open_order("gone", Side::Sell, OrderStatus::Untriggered, StopOrderType::StopLoss))
        .with_open_order(fresh)
        .with_failing_cancel("gone")
}

#[tokio::test]
async fn test_reap_pass_cancels_and_flattens_stale_orders() {
    let exchange = Arc::new(scenario());
    let reaper = StaleOrderReaper::new(exchange.clone(), "BTCUSDT", ReaperConfig::default());

    let report = reaper.reap_once(NOW_MS).await;

    assert_eq!(
        report,
        ReapReport {
            inspected: 5,
            cancelled: 3,
            flattened: 2,
            failures: 1,
        }
    );
    assert_eq!(exchange.cancelled(), vec!["tp-sl", "unfilled", "partial"]);

    let placed = exchange.placed();
    assert_eq!(placed.len(), 2);
    for order in &placed {
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.size_unit, SizeUnit::BaseCoin);
    }
    // bracket leg keeps its own side and full qty
    assert_eq!((placed[0].side, placed[0].qty), (Side::Sell, dec("0.5")));
    // partial fill is closed against the entry side for the executed qty
    assert_eq!((placed[1].side, placed[1].qty), (Side::Sell, dec("0.2")));
}

#[tokio::test]
async fn test_duplicate_listing_flattens_once() {
    let partial = fvgbot::models::OpenOrder {
        cum_exec_qty: dec("0.2"),
        ..open_order("partial", Side::Buy, OrderStatus::PartiallyFilled, StopOrderType::None)
    };
    let bracket = open_order("tp-sl", Side::Sell, OrderStatus::Untriggered, StopOrderType::BidirectionalTpsl);
    let exchange = Arc::new(
        ScriptedExchange::new()
            .with_open_order(bracket.clone())
            .with_open_order(partial.clone())
            .with_open_order(bracket)
            .with_open_order(partial),
    );
    let reaper = StaleOrderReaper::new(exchange.clone(), "BTCUSDT", ReaperConfig::default());

    let report = reaper.reap_once(NOW_MS).await;

    assert_eq!(report.inspected, 2);
    assert_eq!(report.flattened, 2);
    assert_eq!(exchange.cancelled(), vec!["tp-sl", "partial"]);

    let placed = exchange.placed();
    assert_eq!(placed.len(), 2);
    assert_eq!((placed[0].side, placed[0].qty), (Side::Sell, dec("0.5")));
    assert_eq!((placed[1].side, placed[1].qty), (Side::Sell, dec("0.2")));
}

#[tokio::test]
async fn test_failed_cancel_never_flattens() {
    let exchange = Arc::new(
        ScriptedExchange::new()
            .with_open_order(open_order("gone", Side::Sell, OrderStatus::Untriggered, StopOrderType::TakeProfit))
            .with_failing_cancel("gone"),
    );
    let reaper = StaleOrderReaper::new(exchange.clone(), "BTCUSDT", ReaperConfig::default());

    let report = reaper.reap_once(NOW_MS).await;

    assert_eq!(report.failures, 1);
    assert!(exchange.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_runs_until_cancelled() {
    let exchange = Arc::new(scenario());
    let reaper = StaleOrderReaper::new(exchange.clone(), "BTCUSDT", ReaperConfig::default());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reaper.run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    handle.await.unwrap();

    // first tick fires immediately; orders created at 0 are long stale by wall clock
    assert!(exchange.cancelled().contains(&"unfilled".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_controller_start_stop() {
    let exchange = Arc::new(ScriptedExchange::new());
    let mut controller = Controller::new(exchange, test_config());

    assert_eq!(controller.status(), BotStatus::Stopped);
    assert!(!controller.stop().await);

    controller.start().unwrap();
    assert!(matches!(controller.start(), Err(BotError::AlreadyRunning)));
    assert!(matches!(controller.status(), BotStatus::Running { .. }));

    assert!(controller.stop().await);
    assert_eq!(controller.status(), BotStatus::Stopped);

    // restart after a clean stop
    controller.start().unwrap();
    assert!(controller.stop().await);
}
