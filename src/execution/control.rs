use super::reaper::StaleOrderReaper;
use super::trading_loop::TradingLoop;
use crate::api::Exchange;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    Stopped,
    /// Per-loop liveness; a loop that exited on its own shows `false`
    Running { trading: bool, reaper: bool },
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn state(alive: bool) -> &'static str {
            if alive {
                "running"
            } else {
                "exited"
            }
        }

        match self {
            BotStatus::Stopped => write!(f, "stopped"),
            BotStatus::Running { trading, reaper } => write!(
                f,
                "trading loop {}, order reaper {}",
                state(*trading),
                state(*reaper)
            ),
        }
    }
}

struct RunningBot {
    cancel: CancellationToken,
    trading: JoinHandle<Result<()>>,
    reaper: JoinHandle<()>,
}

impl RunningBot {
    fn is_alive(&self) -> bool {
        !self.trading.is_finished() || !self.reaper.is_finished()
    }
}

/// Starts and stops the trading loop and the order reaper together
pub struct Controller<E: Exchange + 'static> {
    exchange: Arc<E>,
    config: BotConfig,
    running: Option<RunningBot>,
}

impl<E: Exchange + 'static> Controller<E> {
    pub fn new(exchange: Arc<E>, config: BotConfig) -> Self {
        Self {
            exchange,
            config,
            running: None,
        }
    }

    pub fn exchange(&self) -> &Arc<E> {
        &self.exchange
    }

    /// Spawn both loops under one cancellation token
    ///
    /// A previous run whose loops have both exited is reaped first.
    pub fn start(&mut self) -> Result<()> {
        if self.running.as_ref().is_some_and(RunningBot::is_alive) {
            return Err(BotError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();

        let trading_loop = TradingLoop::new(Arc::clone(&self.exchange), &self.config);
        let trading = tokio::spawn(trading_loop.run(cancel.child_token()));

        let reaper = StaleOrderReaper::new(
            Arc::clone(&self.exchange),
            self.config.trading.symbol.clone(),
            self.config.reaper.clone(),
        );
        let reaper = tokio::spawn(reaper.run(cancel.child_token()));

        tracing::info!(symbol = %self.config.trading.symbol, "Bot started");
        self.running = Some(RunningBot {
            cancel,
            trading,
            reaper,
        });
        Ok(())
    }

    /// Cancel both loops and wait for them to finish. Returns `false` if nothing was running.
    pub async fn stop(&mut self) -> bool {
        let Some(bot) = self.running.take() else {
            return false;
        };

        bot.cancel.cancel();

        match bot.trading.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Trading loop had exited with error: {}", e),
            Err(e) => tracing::error!("Trading loop task failed: {}", e),
        }
        if let Err(e) = bot.reaper.await {
            tracing::error!("Order reaper task failed: {}", e);
        }

        tracing::info!("Bot stopped");
        true
    }

    pub fn status(&self) -> BotStatus {
        match &self.running {
            None => BotStatus::Stopped,
            Some(bot) => BotStatus::Running {
                trading: !bot.trading.is_finished(),
                reaper: !bot.reaper.is_finished(),
            },
        }
    }
}
