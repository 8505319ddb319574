//! Bot configuration.
//!
//! Values come from an optional TOML file, then `FVGBOT__SECTION__KEY`
//! environment variables. Every field falls back to the defaults below, so an
//! empty file is a valid configuration.

use crate::error::{BotError, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_CONFIG_PATH: &str = "config/fvgbot.toml";
const ENV_PREFIX: &str = "FVGBOT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub sizing: SizingConfig,
    pub reaper: ReaperConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub recv_window_ms: u64,
    pub category: String,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-testnet.bybit.com".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            recv_window_ms: 5000,
            category: "spot".to_string(),
            requests_per_second: 10,
            timeout_secs: 10,
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("recv_window_ms", &self.recv_window_ms)
            .field("category", &self.category)
            .field("requests_per_second", &self.requests_per_second)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Instrument, candle timing and per-side observation budgets
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    /// Exchange kline interval code, e.g. "15" for 15 minutes
    pub interval: String,
    pub frame_ms: i64,
    /// Added to every candle-close wait to absorb feed latency
    pub wake_margin_ms: i64,
    /// Candles to sit out after a gap has been decided
    pub cooldown_candles: u32,
    pub expand_budget_bullish: u32,
    pub expand_budget_bearish: u32,
    pub cover_budget_bullish: u32,
    pub cover_budget_bearish: u32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: "15".to_string(),
            frame_ms: 900_000,
            wake_margin_ms: 2_000,
            cooldown_candles: 2,
            expand_budget_bullish: 3,
            expand_budget_bearish: 3,
            cover_budget_bullish: 3,
            cover_budget_bearish: 3,
        }
    }
}

/// Risk sizing constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of the gap the price must retrace into before entry
    pub entry_fraction: f64,
    /// Stop-loss distance beyond the far gap bound, as a fraction of that bound
    pub sl_offset: f64,
    pub reward_ratio: f64,
    /// Fraction of the balance put at risk per trade
    pub risk_fraction: f64,
    pub leverage: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            entry_fraction: 0.2,
            sl_offset: 0.1,
            reward_ratio: 2.0,
            risk_fraction: 0.03,
            leverage: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    pub poll_interval_secs: u64,
    /// Maximum lifetime of a filled position (bracket legs, partial fills)
    pub max_trade_duration_ms: i64,
    /// Maximum lifetime of an entry order nobody has filled
    pub max_order_duration_ms: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 100,
            max_trade_duration_ms: 9_000_000,
            max_order_duration_ms: 9_000_000,
        }
    }
}

/// Exponential backoff for transient exchange failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fvgbot=info".to_string(),
            file: None,
        }
    }
}

impl BotConfig {
    /// Load from `path` (optional) and the environment, then validate
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let raw = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: BotConfig = raw.try_deserialize()?;

        // Plain exchange variable names are accepted as well
        if cfg.exchange.api_key.is_empty() {
            if let Ok(key) = std::env::var("BYBIT_API_KEY") {
                cfg.exchange.api_key = key;
            }
        }
        if cfg.exchange.api_secret.is_empty() {
            if let Ok(secret) = std::env::var("BYBIT_API_SECRET") {
                cfg.exchange.api_secret = secret;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml(toml: &str) -> Result<Self> {
        let cfg: BotConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(BotError::Config(::config::ConfigError::Message(msg)));

        let t = &self.trading;
        if t.symbol.is_empty() {
            return invalid("trading.symbol must not be empty".into());
        }
        if t.frame_ms <= 0 {
            return invalid(format!("trading.frame_ms must be positive, got {}", t.frame_ms));
        }
        if t.wake_margin_ms < 0 {
            return invalid("trading.wake_margin_ms must not be negative".into());
        }
        if let Ok(minutes) = t.interval.parse::<i64>() {
            let Some(interval_ms) = minutes.checked_mul(60_000) else {
                return invalid(format!("trading.interval {} is out of range", t.interval));
            };
            if interval_ms != t.frame_ms {
                return invalid(format!(
                    "trading.frame_ms {} does not match interval {} ({} ms)",
                    t.frame_ms, t.interval, interval_ms
                ));
            }
        }

        let s = &self.sizing;
        for (name, value) in [
            ("sizing.entry_fraction", s.entry_fraction),
            ("sizing.sl_offset", s.sl_offset),
            ("sizing.risk_fraction", s.risk_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{} must be in (0, 1], got {}", name, value));
            }
        }
        if s.reward_ratio <= 0.0 || s.leverage <= 0.0 {
            return invalid("sizing.reward_ratio and sizing.leverage must be positive".into());
        }

        if self.reaper.poll_interval_secs == 0 {
            return invalid("reaper.poll_interval_secs must be positive".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }

        Ok(())
    }
}
