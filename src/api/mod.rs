pub mod bybit;

pub use bybit::BybitClient;

use crate::models::{Candle, CoinBalance, InstrumentFilters, OpenOrder, OrderAck, OrderRequest};
use crate::Result;
use async_trait::async_trait;

/// Exchange operations the bot depends on
///
/// Implementations collapse transport failures into `BotError::Network` and
/// non-success HTTP replies into `BotError::HttpStatus` and exchange-level
/// rejections into `BotError::ApiRejected`.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Most recent `limit` candles, oldest first. The last one is still forming.
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Candle>>;

    /// Wallet balance of one coin. A coin the wallet does not hold is 0.
    async fn fetch_balance(&self, coin: &str) -> Result<f64>;

    /// Every non-empty coin balance in the wallet
    async fn fetch_balances(&self) -> Result<Vec<CoinBalance>>;

    async fn fetch_instrument_filters(&self, symbol: &str) -> Result<InstrumentFilters>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>>;
}
