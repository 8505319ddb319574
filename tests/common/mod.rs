#![allow(dead_code)]

use async_trait::async_trait;
use fvgbot::config::BotConfig;
use fvgbot::models::{
    Candle, CoinBalance, InstrumentFilters, OpenOrder, OrderAck, OrderRequest, OrderStatus,
    OrderType, Side, StopOrderType,
};
use fvgbot::{BotError, Exchange, Result};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const FRAME_MS: i64 = 900_000;
/// 2001-09-09, far enough back that every candle close is already in the past
pub const BASE_MS: i64 = 1_000_000_000_000;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Candle number `index` frames after `BASE_MS`
pub fn candle(index: i64, high: f64, low: f64) -> Candle {
    Candle {
        open_time_ms: BASE_MS + index * FRAME_MS,
        open: low,
        high,
        low,
        close: high,
        volume: 1.0,
        turnover: high,
    }
}

pub fn btc_filters() -> InstrumentFilters {
    InstrumentFilters {
        symbol: "BTCUSDT".into(),
        base_coin: "BTC".into(),
        quote_coin: "USDT".into(),
        base_precision: dec("0.000001"),
        quote_precision: dec("0.01"),
        min_qty: dec("0.000048"),
        max_qty: dec("200"),
        min_notional: dec("1"),
        max_notional: dec("2000000"),
        tick_size: dec("0.01"),
    }
}

pub fn open_order(id: &str, side: Side, status: OrderStatus, stop: StopOrderType) -> OpenOrder {
    OpenOrder {
        id: id.into(),
        symbol: "BTCUSDT".into(),
        side,
        order_type: OrderType::Limit,
        status,
        qty: dec("0.5"),
        cum_exec_qty: Decimal::ZERO,
        created_at_ms: 0,
        updated_at_ms: 0,
        stop_order_type: stop,
    }
}

pub fn test_config() -> BotConfig {
    BotConfig::default()
}

/// In-memory exchange replaying a fixed script of candle responses
///
/// When the candle script runs out it cancels `done` and answers with a
/// permanent rejection, so a loop driven by `done` stops on its own.
pub struct ScriptedExchange {
    candles: Mutex<VecDeque<Result<Vec<Candle>>>>,
    balances: HashMap<String, f64>,
    filters: Option<InstrumentFilters>,
    open_orders: Mutex<Vec<OpenOrder>>,
    failing_cancels: HashSet<String>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub candle_calls: Mutex<usize>,
    pub done: CancellationToken,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self {
            candles: Mutex::new(VecDeque::new()),
            balances: HashMap::new(),
            filters: Some(btc_filters()),
            open_orders: Mutex::new(Vec::new()),
            failing_cancels: HashSet::new(),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            candle_calls: Mutex::new(0),
            done: CancellationToken::new(),
        }
    }

    pub fn with_candles(self, batch: Vec<Candle>) -> Self {
        self.candles.lock().unwrap().push_back(Ok(batch));
        self
    }

    pub fn with_candle_error(self, error: BotError) -> Self {
        self.candles.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_balance(mut self, coin: &str, amount: f64) -> Self {
        self.balances.insert(coin.to_string(), amount);
        self
    }

    pub fn without_filters(mut self) -> Self {
        self.filters = None;
        self
    }

    pub fn with_open_order(self, order: OpenOrder) -> Self {
        self.open_orders.lock().unwrap().push(order);
        self
    }

    pub fn with_failing_cancel(mut self, order_id: &str) -> Self {
        self.failing_cancels.insert(order_id.to_string());
        self
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn candle_calls(&self) -> usize {
        *self.candle_calls.lock().unwrap()
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn fetch_candles(&self, _symbol: &str, _interval: &str, limit: usize) -> Result<Vec<Candle>> {
        *self.candle_calls.lock().unwrap() += 1;
        match self.candles.lock().unwrap().pop_front() {
            Some(Ok(mut batch)) => {
                let skip = batch.len().saturating_sub(limit);
                Ok(batch.split_off(skip))
            }
            Some(Err(e)) => Err(e),
            None => {
                self.done.cancel();
                Err(BotError::rejected(10001, "script exhausted"))
            }
        }
    }

    async fn fetch_balance(&self, coin: &str) -> Result<f64> {
        Ok(self.balances.get(coin).copied().unwrap_or(0.0))
    }

    async fn fetch_balances(&self) -> Result<Vec<CoinBalance>> {
        Ok(self
            .balances
            .iter()
            .map(|(coin, amount)| CoinBalance {
                coin: coin.clone(),
                wallet_balance: *amount,
            })
            .collect())
    }

    async fn fetch_instrument_filters(&self, symbol: &str) -> Result<InstrumentFilters> {
        self.filters
            .clone()
            .ok_or_else(|| BotError::decode(format!("no instrument {}", symbol)))
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut placed = self.placed.lock().unwrap();
        placed.push(order.clone());
        Ok(OrderAck {
            order_id: format!("ord-{}", placed.len()),
            order_link_id: order.order_link_id.clone(),
        })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
        if self.failing_cancels.contains(order_id) {
            return Err(BotError::rejected(110001, "order does not exist"));
        }
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(())
    }

    async fn list_open_orders(&self, _symbol: &str) -> Result<Vec<OpenOrder>> {
        Ok(self.open_orders.lock().unwrap().clone())
    }
}
