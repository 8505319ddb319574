use crate::config::SizingConfig;
use crate::error::BotError;
use crate::models::{Gap, GapKind, InstrumentFilters, Side};
use crate::Result;

/// Bracket order derived from a surviving gap, before exchange rounding
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub kind: GapKind,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Quote units for bullish gaps, base units for bearish ones
    pub raw_size: f64,
}

/// Turns a gap plus account balance into entry, stop, target and size
#[derive(Debug, Clone)]
pub struct OrderSizer {
    config: SizingConfig,
}

impl OrderSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Coin whose balance funds an order on this gap
    pub fn balance_asset<'a>(&self, kind: GapKind, filters: &'a InstrumentFilters) -> &'a str {
        match kind {
            GapKind::Bullish => &filters.quote_coin,
            GapKind::Bearish => &filters.base_coin,
        }
    }

    pub fn size(&self, gap: &Gap, balance: f64, asset: &str) -> Result<OrderIntent> {
        if !(balance.is_finite() && balance > 0.0) {
            return Err(BotError::InsufficientBalance {
                asset: asset.to_string(),
            });
        }

        let c = &self.config;
        let width = gap.width();

        let intent = match gap.kind {
            GapKind::Bullish => {
                let entry = gap.upper_bound - c.entry_fraction * width;
                let sl = gap.lower_bound * (1.0 - c.sl_offset);
                let tp = entry + (entry - sl) * c.reward_ratio;
                let size = balance * c.risk_fraction / (entry - sl) * entry * c.leverage / entry;
                OrderIntent {
                    kind: gap.kind,
                    side: Side::Buy,
                    entry_price: entry,
                    stop_loss: sl,
                    take_profit: tp,
                    raw_size: size,
                }
            }
            GapKind::Bearish => {
                let entry = gap.lower_bound + c.entry_fraction * width;
                let sl = gap.upper_bound * (1.0 + c.sl_offset);
                let tp = entry - (sl - entry) * c.reward_ratio;
                let size = balance * c.risk_fraction / (sl - entry) * sl * c.leverage;
                OrderIntent {
                    kind: gap.kind,
                    side: Side::Sell,
                    entry_price: entry,
                    stop_loss: sl,
                    take_profit: tp,
                    raw_size: size,
                }
            }
        };

        check_geometry(&intent)?;

        tracing::info!(
            side = ?intent.side,
            entry = intent.entry_price,
            sl = intent.stop_loss,
            tp = intent.take_profit,
            size = intent.raw_size,
            "Order params calculated"
        );
        Ok(intent)
    }
}

// Entry must sit strictly between stop and target on the profitable side
fn check_geometry(intent: &OrderIntent) -> Result<()> {
    let ordered = match intent.side {
        Side::Buy => intent.stop_loss < intent.entry_price && intent.entry_price < intent.take_profit,
        Side::Sell => intent.take_profit < intent.entry_price && intent.entry_price < intent.stop_loss,
    };
    if !ordered || !intent.raw_size.is_finite() || intent.raw_size <= 0.0 {
        return Err(BotError::ValidationFailed(format!(
            "degenerate order geometry: sl {} entry {} tp {} size {}",
            intent.stop_loss, intent.entry_price, intent.take_profit, intent.raw_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> OrderSizer {
        OrderSizer::new(SizingConfig {
            entry_fraction: 0.2,
            sl_offset: 0.1,
            reward_ratio: 2.0,
            risk_fraction: 0.03,
            leverage: 1.0,
        })
    }

    fn gap(kind: GapKind, lower: f64, upper: f64) -> Gap {
        Gap {
            kind,
            lower_bound: lower,
            upper_bound: upper,
            created_at_ms: 0,
        }
    }

    #[test]
    fn test_bullish_worked_example() {
        let intent = sizer()
            .size(&gap(GapKind::Bullish, 100.0, 110.0), 1000.0, "USDT")
            .unwrap();

        assert_eq!(intent.side, Side::Buy);
        assert!((intent.entry_price - 108.0).abs() < 1e-9);
        assert!((intent.stop_loss - 90.0).abs() < 1e-9);
        assert!((intent.take_profit - 144.0).abs() < 1e-9);
        assert!((intent.raw_size - 1.666_666_666_7).abs() < 1e-6);
    }

    #[test]
    fn test_bearish_sizing() {
        // entry = 100 + 0.2 * 10 = 102, sl = 110 * 1.1 = 121, tp = 102 - 19 * 2 = 64
        // size = 2 * 0.03 / 19 * 121
        let intent = sizer()
            .size(&gap(GapKind::Bearish, 100.0, 110.0), 2.0, "BTC")
            .unwrap();

        assert_eq!(intent.side, Side::Sell);
        assert!((intent.entry_price - 102.0).abs() < 1e-9);
        assert!((intent.stop_loss - 121.0).abs() < 1e-9);
        assert!((intent.take_profit - 64.0).abs() < 1e-9);
        assert!((intent.raw_size - 2.0 * 0.03 / 19.0 * 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_balance_is_insufficient() {
        let result = sizer().size(&gap(GapKind::Bullish, 100.0, 110.0), 0.0, "USDT");
        assert!(matches!(
            result,
            Err(BotError::InsufficientBalance { asset }) if asset == "USDT"
        ));
    }

    #[test]
    fn test_leverage_scales_size() {
        let levered = OrderSizer::new(SizingConfig {
            leverage: 3.0,
            ..SizingConfig::default()
        });
        let g = gap(GapKind::Bullish, 100.0, 110.0);

        let base = sizer().size(&g, 1000.0, "USDT").unwrap();
        let scaled = levered.size(&g, 1000.0, "USDT").unwrap();
        assert!((scaled.raw_size - 3.0 * base.raw_size).abs() < 1e-9);
    }

    #[test]
    fn test_balance_asset_by_side() {
        let filters = InstrumentFilters {
            symbol: "BTCUSDT".into(),
            base_coin: "BTC".into(),
            quote_coin: "USDT".into(),
            base_precision: Default::default(),
            quote_precision: Default::default(),
            min_qty: Default::default(),
            max_qty: Default::default(),
            min_notional: Default::default(),
            max_notional: Default::default(),
            tick_size: Default::default(),
        };

        assert_eq!(sizer().balance_asset(GapKind::Bullish, &filters), "USDT");
        assert_eq!(sizer().balance_asset(GapKind::Bearish, &filters), "BTC");
    }
}
