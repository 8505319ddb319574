use crate::config::TradingConfig;
use crate::models::{Candle, Gap, GapKind};

/// Remaining iterations for each check on an active gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationBudget {
    pub expand_remaining: u32,
    pub cover_remaining: u32,
}

impl ObservationBudget {
    pub fn new(expand_remaining: u32, cover_remaining: u32) -> Self {
        Self {
            expand_remaining,
            cover_remaining,
        }
    }

    pub fn for_kind(kind: GapKind, config: &TradingConfig) -> Self {
        match kind {
            GapKind::Bullish => Self::new(config.expand_budget_bullish, config.cover_budget_bullish),
            GapKind::Bearish => Self::new(config.expand_budget_bearish, config.cover_budget_bearish),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.expand_remaining == 0 && self.cover_remaining == 0
    }

    // Both counters move together, whichever checks ran
    fn consume(&mut self) {
        self.expand_remaining = self.expand_remaining.saturating_sub(1);
        self.cover_remaining = self.cover_remaining.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Observing,
    /// Price traded back through the gap; no order
    Covered,
    /// Both budgets ran out without a cover; the gap is tradeable
    Exhausted,
}

/// Bounded observation of one gap as new candles close
#[derive(Debug, Clone)]
pub struct GapLifecycle {
    gap: Gap,
    budget: ObservationBudget,
    state: LifecycleState,
    last_evaluated_ms: i64,
}

impl GapLifecycle {
    pub fn new(gap: Gap, budget: ObservationBudget) -> Self {
        let state = if budget.is_exhausted() {
            LifecycleState::Exhausted
        } else {
            LifecycleState::Observing
        };
        Self {
            gap,
            budget,
            state,
            last_evaluated_ms: gap.created_at_ms,
        }
    }

    pub fn gap(&self) -> &Gap {
        &self.gap
    }

    pub fn budget(&self) -> ObservationBudget {
        self.budget
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Feed one newly closed candle
    ///
    /// Returns `None` without touching anything if the candle is not newer than
    /// the last one evaluated. Once the gap leaves `Observing` further candles
    /// are ignored and the final state is returned.
    pub fn step(&mut self, candle: &Candle) -> Option<LifecycleState> {
        if self.state != LifecycleState::Observing {
            return Some(self.state);
        }
        if candle.open_time_ms <= self.last_evaluated_ms {
            return None;
        }
        self.last_evaluated_ms = candle.open_time_ms;

        if self.budget.expand_remaining > 0 {
            self.expand(candle);
        }

        if self.budget.cover_remaining > 0 && self.is_covered_by(candle) {
            tracing::info!(gap = ?self.gap, candle_low = candle.low, candle_high = candle.high, "Gap covered");
            self.state = LifecycleState::Covered;
            return Some(self.state);
        }

        self.budget.consume();
        if self.budget.is_exhausted() {
            self.state = LifecycleState::Exhausted;
        }
        Some(self.state)
    }

    fn expand(&mut self, candle: &Candle) {
        match self.gap.kind {
            GapKind::Bullish if candle.low > self.gap.upper_bound => {
                tracing::info!(from = self.gap.upper_bound, to = candle.low, "Expanded gap upper bound");
                self.gap.upper_bound = candle.low;
            }
            GapKind::Bearish if candle.high < self.gap.lower_bound => {
                tracing::info!(from = self.gap.lower_bound, to = candle.high, "Expanded gap lower bound");
                self.gap.lower_bound = candle.high;
            }
            _ => {}
        }
    }

    fn is_covered_by(&self, candle: &Candle) -> bool {
        match self.gap.kind {
            GapKind::Bullish => candle.low < self.gap.lower_bound,
            GapKind::Bearish => candle.high > self.gap.upper_bound,
        }
    }
}
