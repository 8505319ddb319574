// Trading loop, order reaper and the control plane driving them
pub mod control;
pub mod reaper;
pub mod timing;
pub mod trading_loop;

pub use control::{BotStatus, Controller};
pub use reaper::{classify, ReapAction, ReapReport, StaleOrderReaper};
pub use timing::{backoff_delay, retry, sleep_or_cancel, wake_delay};
pub use trading_loop::{GapOutcome, TradingLoop};
