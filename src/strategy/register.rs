use super::lifecycle::{GapLifecycle, LifecycleState};
use crate::models::{Candle, Gap};

/// Single slot for the gap currently under observation
///
/// Owned by the trading loop. Covering a gap empties the slot, and a surviving
/// gap can only be taken out once.
#[derive(Debug, Default)]
pub struct GapRegister {
    slot: Option<GapLifecycle>,
}

impl GapRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing a gap. Hands the lifecycle back if the slot is taken.
    pub fn open(&mut self, lifecycle: GapLifecycle) -> Result<(), GapLifecycle> {
        if self.slot.is_some() {
            return Err(lifecycle);
        }
        self.slot = Some(lifecycle);
        Ok(())
    }

    pub fn active(&self) -> Option<&GapLifecycle> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn is_observing(&self) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|l| l.state() == LifecycleState::Observing)
    }

    /// Step the active gap with a newly closed candle
    ///
    /// `None` when the slot is empty or the candle was already evaluated.
    pub fn advance(&mut self, candle: &Candle) -> Option<LifecycleState> {
        let state = self.slot.as_mut()?.step(candle)?;
        if state == LifecycleState::Covered {
            self.slot = None;
        }
        Some(state)
    }

    /// Remove and return the gap if it survived observation
    pub fn take_survivor(&mut self) -> Option<Gap> {
        match self.slot.as_ref().map(|l| l.state()) {
            Some(LifecycleState::Exhausted) => self.slot.take().map(|l| *l.gap()),
            _ => None,
        }
    }

    /// Drop whatever is in the slot
    pub fn clear(&mut self) -> Option<Gap> {
        self.slot.take().map(|l| *l.gap())
    }
}
