use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candle for one fixed interval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

/// Order direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

/// Direction of a three-candle price gap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GapKind {
    Bullish,
    Bearish,
}

impl GapKind {
    /// Side of the entry order placed for a surviving gap
    pub fn entry_side(self) -> Side {
        match self {
            GapKind::Bullish => Side::Buy,
            GapKind::Bearish => Side::Sell,
        }
    }
}

/// Untraded price interval left between the oldest and newest candle of a triplet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Gap {
    pub kind: GapKind,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub created_at_ms: i64,
}

impl Gap {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// Lot size and price filters for the traded instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentFilters {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    pub base_precision: Decimal,
    pub quote_precision: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub min_notional: Decimal,
    pub max_notional: Decimal,
    pub tick_size: Decimal,
}

/// Wallet balance of a single coin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinBalance {
    pub coin: String,
    pub wallet_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
    Other(String),
}

impl OrderType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Limit" | "LIMIT" => OrderType::Limit,
            "Market" | "MARKET" => OrderType::Market,
            other => OrderType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Limit => "Limit",
            OrderType::Market => "Market",
            OrderType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Untriggered,
    Other(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "New" => OrderStatus::New,
            "PartiallyFilled" => OrderStatus::PartiallyFilled,
            "Untriggered" => OrderStatus::Untriggered,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

/// Conditional-order flavour reported by the exchange (`stopOrderType`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopOrderType {
    None,
    BidirectionalTpsl,
    Tpsl,
    TakeProfit,
    StopLoss,
    Other(String),
}

impl StopOrderType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "UNKNOWN" => StopOrderType::None,
            "BidirectionalTpslOrder" => StopOrderType::BidirectionalTpsl,
            "tpslOrder" | "OcoOrder" => StopOrderType::Tpsl,
            "TakeProfit" | "PartialTakeProfit" => StopOrderType::TakeProfit,
            "StopLoss" | "PartialStopLoss" => StopOrderType::StopLoss,
            other => StopOrderType::Other(other.to_string()),
        }
    }

    /// Whether this order is a protective stop/take-profit leg
    pub fn is_bracket(&self) -> bool {
        matches!(
            self,
            StopOrderType::BidirectionalTpsl
                | StopOrderType::Tpsl
                | StopOrderType::TakeProfit
                | StopOrderType::StopLoss
        )
    }
}

/// Order resting on the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenOrder {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub qty: Decimal,
    pub cum_exec_qty: Decimal,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub stop_order_type: StopOrderType,
}

/// Unit the order quantity is denominated in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SizeUnit {
    BaseCoin,
    QuoteCoin,
}

impl SizeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeUnit::BaseCoin => "baseCoin",
            SizeUnit::QuoteCoin => "quoteCoin",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
}

impl TimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// Everything the exchange needs to place one order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub size_unit: SizeUnit,
    pub qty: Decimal,
    pub price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub sl_order_type: Option<OrderType>,
    pub tp_order_type: Option<OrderType>,
    pub order_link_id: String,
}

impl OrderRequest {
    /// Market order that closes `qty` base units in the given direction
    pub fn flatten(symbol: &str, side: Side, qty: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Gtc,
            size_unit: SizeUnit::BaseCoin,
            qty,
            price: None,
            take_profit: None,
            stop_loss: None,
            sl_order_type: None,
            tp_order_type: None,
            order_link_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
    pub order_link_id: String,
}
