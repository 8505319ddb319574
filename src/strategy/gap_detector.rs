use crate::models::{Candle, Gap, GapKind};

/// Classifies a three-candle window as a bullish gap, a bearish gap, or nothing
///
/// Only the oldest (`O`) and newest (`N`) candle are compared; the middle one
/// only guarantees a candle of separation between them.
///
/// - Bullish: `N.high < O.low`, bounds `(N.high, O.low)`
/// - Bearish: `N.low > O.high`, bounds `(O.high, N.low)`
///
/// Bullish is checked first and wins if both were ever to hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapDetector;

impl GapDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, oldest: &Candle, _middle: &Candle, newest: &Candle) -> Option<Gap> {
        if newest.high < oldest.low {
            return Some(Gap {
                kind: GapKind::Bullish,
                lower_bound: newest.high,
                upper_bound: oldest.low,
                created_at_ms: newest.open_time_ms,
            });
        }

        if newest.low > oldest.high {
            return Some(Gap {
                kind: GapKind::Bearish,
                lower_bound: oldest.high,
                upper_bound: newest.low,
                created_at_ms: newest.open_time_ms,
            });
        }

        None
    }

    /// Detect on the three closed candles preceding the forming one
    ///
    /// `candles` is oldest first with the still-forming candle last, as returned
    /// by the exchange. Returns `None` when fewer than four candles are given.
    pub fn detect_closed(&self, candles: &[Candle]) -> Option<Gap> {
        if candles.len() < 4 {
            return None;
        }
        let closed = &candles[candles.len() - 4..candles.len() - 1];
        self.detect(&closed[0], &closed[1], &closed[2])
    }
}
