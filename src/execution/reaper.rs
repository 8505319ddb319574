use crate::api::Exchange;
use crate::config::ReaperConfig;
use crate::models::{OpenOrder, OrderRequest, OrderStatus, OrderType, Side};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What to do with one open order
#[derive(Debug, Clone, PartialEq)]
pub enum ReapAction {
    Keep,
    /// Nothing was filled; cancelling is enough
    CancelOnly,
    /// Cancel, then close the exposed position with a market order
    CancelAndFlatten { side: Side, qty: Decimal },
}

/// Counters for one reap pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub inspected: usize,
    pub cancelled: usize,
    pub flattened: usize,
    pub failures: usize,
}

/// Decide an order's fate at `now_ms`
///
/// - Stop/take-profit legs older than the trade limit: cancel and flatten the
///   full quantity. The leg's own side already points against the position.
/// - Unfilled limit orders older than the order limit: cancel.
/// - Partially filled limit orders not updated within the trade limit: cancel
///   and flatten the executed quantity in the opposite direction.
pub fn classify(order: &OpenOrder, now_ms: i64, config: &ReaperConfig) -> ReapAction {
    let age = now_ms - order.created_at_ms;

    if order.stop_order_type.is_bracket() {
        if age > config.max_trade_duration_ms {
            return ReapAction::CancelAndFlatten {
                side: order.side,
                qty: order.qty,
            };
        }
        return ReapAction::Keep;
    }

    if order.order_type != OrderType::Limit {
        return ReapAction::Keep;
    }

    match order.status {
        OrderStatus::New if age > config.max_order_duration_ms => ReapAction::CancelOnly,
        OrderStatus::PartiallyFilled
            if now_ms - order.updated_at_ms > config.max_trade_duration_ms =>
        {
            if order.cum_exec_qty > Decimal::ZERO {
                ReapAction::CancelAndFlatten {
                    side: order.side.opposite(),
                    qty: order.cum_exec_qty,
                }
            } else {
                ReapAction::CancelOnly
            }
        }
        _ => ReapAction::Keep,
    }
}

/// Cancels orders and flattens positions that stayed open too long
pub struct StaleOrderReaper<E: Exchange> {
    exchange: Arc<E>,
    symbol: String,
    config: ReaperConfig,
}

impl<E: Exchange> StaleOrderReaper<E> {
    pub fn new(exchange: Arc<E>, symbol: impl Into<String>, config: ReaperConfig) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            config,
        }
    }

    /// Reap immediately, then once per poll interval until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            symbol = %self.symbol,
            "Order reaper starting (every {}s)",
            self.config.poll_interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.reap_once(Utc::now().timestamp_millis()).await;
            if report.cancelled > 0 || report.failures > 0 {
                tracing::info!(?report, "Reap pass finished");
            }
        }

        tracing::info!("Order reaper stopped");
    }

    pub async fn reap_once(&self, now_ms: i64) -> ReapReport {
        let mut report = ReapReport::default();

        let orders = match self.exchange.list_open_orders(&self.symbol).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!("Can't get open orders, skipping this pass: {}", e);
                return report;
            }
        };
        tracing::debug!("Got {} open orders", orders.len());

        let mut seen = HashSet::new();
        for order in &orders {
            if !seen.insert(order.id.as_str()) {
                continue;
            }
            report.inspected += 1;

            match classify(order, now_ms, &self.config) {
                ReapAction::Keep => {}
                ReapAction::CancelOnly => {
                    tracing::info!(order_id = %order.id, "Unfilled order is too old, cancelling it");
                    if self.cancel(order).await {
                        report.cancelled += 1;
                    } else {
                        report.failures += 1;
                    }
                }
                ReapAction::CancelAndFlatten { side, qty } => {
                    tracing::info!(
                        order_id = %order.id,
                        status = ?order.status,
                        "Order protecting a position is too old, cancelling and flattening"
                    );
                    // Never flatten without a confirmed cancel
                    if !self.cancel(order).await {
                        report.failures += 1;
                        continue;
                    }
                    report.cancelled += 1;

                    // TODO: re-read cumExecQty from order history after the cancel so a
                    // fill landing between the listing and the cancel is flattened too.
                    let request = OrderRequest::flatten(&order.symbol, side, qty);
                    match self.exchange.place_order(&request).await {
                        Ok(ack) => {
                            tracing::info!(order_id = %ack.order_id, ?side, %qty, "Position closed");
                            report.flattened += 1;
                        }
                        Err(e) => {
                            tracing::error!(source_order = %order.id, "Error closing position: {}", e);
                            report.failures += 1;
                        }
                    }
                }
            }
        }

        report
    }

    async fn cancel(&self, order: &OpenOrder) -> bool {
        match self.exchange.cancel_order(&order.symbol, &order.id).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, "Order cancelled");
                true
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, "Error cancelling order: {}", e);
                false
            }
        }
    }
}
