use super::Exchange;
use crate::config::ExchangeConfig;
use crate::error::BotError;
use crate::models::{
    Candle, CoinBalance, InstrumentFilters, OpenOrder, OrderAck, OrderRequest, OrderStatus,
    OrderType, Side, StopOrderType,
};
use crate::Result;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

type BybitRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Bybit V5 REST client (spot)
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    category: String,
    rate_limiter: Arc<BybitRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WalletAccount {
    #[serde(default)]
    coin: Vec<WalletCoin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletCoin {
    coin: String,
    #[serde(default)]
    wallet_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentRaw {
    symbol: String,
    base_coin: String,
    quote_coin: String,
    lot_size_filter: LotSizeFilterRaw,
    price_filter: PriceFilterRaw,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilterRaw {
    base_precision: String,
    quote_precision: String,
    min_order_qty: String,
    max_order_qty: String,
    min_order_amt: String,
    max_order_amt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceFilterRaw {
    tick_size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRaw {
    order_id: String,
    symbol: String,
    side: String,
    order_type: String,
    order_status: String,
    qty: String,
    #[serde(default)]
    cum_exec_qty: String,
    created_time: String,
    updated_time: String,
    #[serde(default)]
    stop_order_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResult {
    order_id: String,
    #[serde(default)]
    order_link_id: String,
}

// ============== Conversions ==============

fn parse_f64(raw: &str, field: &str) -> Result<f64> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map_err(|_| BotError::decode(format!("{} is not a number: {:?}", field, raw)))
}

fn parse_i64(raw: &str, field: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| BotError::decode(format!("{} is not an integer: {:?}", field, raw)))
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| BotError::decode(format!("{} is not a decimal: {:?}", field, raw)))
}

/// Filter values must be strictly positive; a zero step or bound is unusable
fn parse_positive(raw: &str, field: &str) -> Result<Decimal> {
    let value = parse_decimal(raw, field)?;
    if value <= Decimal::ZERO {
        return Err(BotError::decode(format!("{} must be positive, got {:?}", field, raw)));
    }
    Ok(value)
}

fn parse_side(raw: &str) -> Result<Side> {
    match raw {
        "Buy" => Ok(Side::Buy),
        "Sell" => Ok(Side::Sell),
        other => Err(BotError::decode(format!("unknown side {:?}", other))),
    }
}

/// Kline rows are `[startTime, open, high, low, close, volume, turnover]`, newest first
fn parse_klines(rows: Vec<Vec<String>>) -> Result<Vec<Candle>> {
    let mut candles = rows
        .into_iter()
        .map(|row| {
            if row.len() < 7 {
                return Err(BotError::decode(format!(
                    "kline row has {} fields, expected 7",
                    row.len()
                )));
            }
            Ok(Candle {
                open_time_ms: parse_i64(&row[0], "startTime")?,
                open: parse_f64(&row[1], "open")?,
                high: parse_f64(&row[2], "high")?,
                low: parse_f64(&row[3], "low")?,
                close: parse_f64(&row[4], "close")?,
                volume: parse_f64(&row[5], "volume")?,
                turnover: parse_f64(&row[6], "turnover")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.open_time_ms);
    Ok(candles)
}

impl TryFrom<InstrumentRaw> for InstrumentFilters {
    type Error = BotError;

    fn try_from(raw: InstrumentRaw) -> Result<Self> {
        let lot = raw.lot_size_filter;
        Ok(InstrumentFilters {
            symbol: raw.symbol,
            base_coin: raw.base_coin,
            quote_coin: raw.quote_coin,
            base_precision: parse_positive(&lot.base_precision, "basePrecision")?,
            quote_precision: parse_positive(&lot.quote_precision, "quotePrecision")?,
            min_qty: parse_positive(&lot.min_order_qty, "minOrderQty")?,
            max_qty: parse_positive(&lot.max_order_qty, "maxOrderQty")?,
            min_notional: parse_positive(&lot.min_order_amt, "minOrderAmt")?,
            max_notional: parse_positive(&lot.max_order_amt, "maxOrderAmt")?,
            tick_size: parse_positive(&raw.price_filter.tick_size, "tickSize")?,
        })
    }
}

impl TryFrom<OrderRaw> for OpenOrder {
    type Error = BotError;

    fn try_from(raw: OrderRaw) -> Result<Self> {
        Ok(OpenOrder {
            side: parse_side(&raw.side)?,
            order_type: OrderType::parse(&raw.order_type),
            status: OrderStatus::parse(&raw.order_status),
            qty: parse_decimal(&raw.qty, "qty")?,
            cum_exec_qty: parse_decimal(&raw.cum_exec_qty, "cumExecQty")?,
            created_at_ms: parse_i64(&raw.created_time, "createdTime")?,
            updated_at_ms: parse_i64(&raw.updated_time, "updatedTime")?,
            stop_order_type: StopOrderType::parse(&raw.stop_order_type),
            id: raw.order_id,
            symbol: raw.symbol,
        })
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.ret_code != 0 {
        return Err(BotError::rejected(envelope.ret_code, envelope.ret_msg));
    }
    Ok(serde_json::from_value(envelope.result)?)
}

fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn decimal_str(value: Decimal) -> String {
    value.normalize().to_string()
}

// ============== Implementation ==============

impl BybitClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
            category: config.category.clone(),
            rate_limiter,
        })
    }

    /// `X-BAPI-SIGN` for a request: HMAC-SHA256 over timestamp, key, recv window and payload
    pub fn sign(&self, timestamp_ms: i64, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes()).map_err(|e| {
            BotError::Config(::config::ConfigError::Message(format!(
                "invalid api secret: {}",
                e
            )))
        })?;
        mac.update(
            format!(
                "{}{}{}{}",
                timestamp_ms, self.api_key, self.recv_window_ms, payload
            )
            .as_bytes(),
        );
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn auth_headers(&self, payload: &str) -> Result<Vec<(&'static str, String)>> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, payload)?;
        Ok(vec![
            ("X-BAPI-API-KEY", self.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp.to_string()),
            ("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string()),
            ("X-BAPI-SIGN", signature),
        ])
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let query = query_string(params);
        let url = format!("{}{}?{}", self.base_url, path, query);
        let mut request = self.client.get(&url);
        if signed {
            for (name, value) in self.auth_headers(&query)? {
                request = request.header(name, value);
            }
        }

        tracing::debug!(path, "GET");
        let response = request.send().await?;
        Self::read_response(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let payload = body.to_string();
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload.clone());
        for (name, value) in self.auth_headers(&payload)? {
            request = request.header(name, value);
        }

        tracing::debug!(path, "POST");
        let response = request.send().await?;
        Self::read_response(response).await
    }

    async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BotError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        parse_envelope(&body)
    }

    async fn wallet_coins(&self, coin: Option<&str>) -> Result<Vec<WalletCoin>> {
        let mut params = vec![("accountType", "UNIFIED".to_string())];
        if let Some(coin) = coin {
            params.push(("coin", coin.to_string()));
        }

        let result: ListResult<WalletAccount> =
            self.get("/v5/account/wallet-balance", &params, true).await?;

        Ok(result
            .list
            .into_iter()
            .next()
            .map(|account| account.coin)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Exchange for BybitClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let params = [
            ("category", self.category.clone()),
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let result: ListResult<Vec<String>> = self.get("/v5/market/kline", &params, false).await?;
        parse_klines(result.list)
    }

    async fn fetch_balance(&self, coin: &str) -> Result<f64> {
        let coins = self.wallet_coins(Some(coin)).await?;
        match coins.iter().find(|c| c.coin == coin) {
            Some(found) => parse_f64(&found.wallet_balance, "walletBalance"),
            None => Ok(0.0),
        }
    }

    async fn fetch_balances(&self) -> Result<Vec<CoinBalance>> {
        self.wallet_coins(None)
            .await?
            .into_iter()
            .map(|c| {
                Ok(CoinBalance {
                    wallet_balance: parse_f64(&c.wallet_balance, "walletBalance")?,
                    coin: c.coin,
                })
            })
            .collect()
    }

    async fn fetch_instrument_filters(&self, symbol: &str) -> Result<InstrumentFilters> {
        let params = [
            ("category", self.category.clone()),
            ("symbol", symbol.to_string()),
            ("status", "Trading".to_string()),
        ];
        let result: ListResult<InstrumentRaw> =
            self.get("/v5/market/instruments-info", &params, false).await?;

        let raw = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| BotError::decode(format!("no trading instrument {}", symbol)))?;
        InstrumentFilters::try_from(raw)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut body = serde_json::json!({
            "category": self.category,
            "symbol": order.symbol,
            "side": order.side.as_str(),
            "orderType": order.order_type.as_str(),
            "qty": decimal_str(order.qty),
            "timeInForce": order.time_in_force.as_str(),
            "marketUnit": order.size_unit.as_str(),
            "orderLinkId": order.order_link_id,
        });
        let fields = [
            ("price", order.price.map(decimal_str)),
            ("takeProfit", order.take_profit.map(decimal_str)),
            ("stopLoss", order.stop_loss.map(decimal_str)),
            (
                "slOrderType",
                order.sl_order_type.as_ref().map(|t| t.as_str().to_string()),
            ),
            (
                "tpOrderType",
                order.tp_order_type.as_ref().map(|t| t.as_str().to_string()),
            ),
        ];
        if let Some(map) = body.as_object_mut() {
            for (key, value) in fields {
                if let Some(value) = value {
                    map.insert(key.to_string(), serde_json::Value::String(value));
                }
            }
        }

        let result: CreateOrderResult = self.post("/v5/order/create", body).await?;
        Ok(OrderAck {
            order_id: result.order_id,
            order_link_id: result.order_link_id,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let body = serde_json::json!({
            "category": self.category,
            "symbol": symbol,
            "orderId": order_id,
        });
        let _: serde_json::Value = self.post("/v5/order/cancel", body).await?;
        Ok(())
    }

    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>> {
        let params = [
            ("category", self.category.clone()),
            ("symbol", symbol.to_string()),
        ];
        let result: ListResult<OrderRaw> = self.get("/v5/order/realtime", &params, true).await?;
        result.list.into_iter().map(OpenOrder::try_from).collect()
    }
}
