use super::timing::{retry, sleep_or_cancel, wake_delay};
use crate::api::Exchange;
use crate::config::{BotConfig, RetryPolicy, TradingConfig};
use crate::error::BotError;
use crate::models::{Candle, Gap, InstrumentFilters, OrderAck};
use crate::risk::{OrderFilterValidator, OrderSizer};
use crate::strategy::{GapDetector, GapLifecycle, GapRegister, LifecycleState, ObservationBudget};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Candles needed for detection: three closed plus the forming one
const DETECTION_WINDOW: usize = 4;
/// Candles needed while observing: the one that just closed plus the forming one
const OBSERVATION_WINDOW: usize = 2;

/// How a detected gap ended
#[derive(Debug)]
pub enum GapOutcome {
    Covered,
    OrderPlaced(OrderAck),
    /// Survived observation but no order went out (balance, filters, submission)
    Skipped(BotError),
    /// Candle feed kept failing during observation
    Abandoned(BotError),
    Stopped,
}

/// Detect → observe → size → validate → submit, one gap at a time
pub struct TradingLoop<E: Exchange> {
    exchange: Arc<E>,
    trading: TradingConfig,
    retry: RetryPolicy,
    detector: GapDetector,
    sizer: OrderSizer,
    register: GapRegister,
    /// Open time of the newest (still forming) candle seen so far
    forming_open_ms: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl<E: Exchange> TradingLoop<E> {
    pub fn new(exchange: Arc<E>, config: &BotConfig) -> Self {
        Self {
            exchange,
            trading: config.trading.clone(),
            retry: config.retry.clone(),
            detector: GapDetector::new(),
            sizer: OrderSizer::new(config.sizing.clone()),
            register: GapRegister::new(),
            forming_open_ms: 0,
        }
    }

    pub fn register(&self) -> &GapRegister {
        &self.register
    }

    /// Run until cancelled. Fails only if the instrument filters cannot be loaded.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let symbol = self.trading.symbol.clone();
        tracing::info!(symbol = %symbol, "Getting instrument filters...");

        let filters = match self.exchange.fetch_instrument_filters(&symbol).await {
            Ok(filters) => filters,
            Err(e) => {
                tracing::error!("Stopping trading loop, cannot get instrument filters: {}", e);
                return Err(e);
            }
        };
        tracing::info!(
            base_precision = %filters.base_precision,
            quote_precision = %filters.quote_precision,
            tick_size = %filters.tick_size,
            "Got instrument filters"
        );

        let frame = Duration::from_millis(self.trading.frame_ms as u64);

        while !cancel.is_cancelled() {
            let candles = match self.fetch_candles(DETECTION_WINDOW, &cancel).await {
                Ok(candles) if candles.len() >= DETECTION_WINDOW => candles,
                Ok(candles) => {
                    tracing::warn!("Only {} candles available, waiting a frame", candles.len());
                    if !sleep_or_cancel(&cancel, frame).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!("Candle fetch failed, retrying next frame: {}", e);
                    if !sleep_or_cancel(&cancel, frame).await {
                        break;
                    }
                    continue;
                }
            };
            self.note_forming(&candles);

            let pause_frames = match self.detector.detect_closed(&candles) {
                Some(gap) => {
                    let outcome = self.handle_gap(gap, &filters, &cancel).await;
                    match &outcome {
                        GapOutcome::Stopped => break,
                        GapOutcome::Covered => tracing::info!("Gap covered, no order"),
                        GapOutcome::OrderPlaced(ack) => {
                            tracing::info!(order_id = %ack.order_id, "Order placed")
                        }
                        GapOutcome::Skipped(e) => tracing::warn!("Gap skipped: {}", e),
                        GapOutcome::Abandoned(e) => tracing::warn!("Gap abandoned: {}", e),
                    }
                    self.trading.cooldown_candles
                }
                None => 0,
            };

            let delay = self.until_next_close() + frame * pause_frames;
            tracing::info!("Sleep for {:?}", delay);
            if !sleep_or_cancel(&cancel, delay).await {
                break;
            }
        }

        self.register.clear();
        tracing::info!("Trading loop stopped");
        Ok(())
    }

    /// Observe a freshly detected gap and, if it survives, submit its order
    ///
    /// The register is empty again when this returns.
    pub async fn handle_gap(
        &mut self,
        gap: Gap,
        filters: &InstrumentFilters,
        cancel: &CancellationToken,
    ) -> GapOutcome {
        tracing::info!(
            kind = ?gap.kind,
            lower = gap.lower_bound,
            upper = gap.upper_bound,
            "Found gap"
        );

        let lifecycle = GapLifecycle::new(gap, ObservationBudget::for_kind(gap.kind, &self.trading));
        debug_assert!(self.register.is_empty(), "gap register not cleared after previous gap");
        if self.register.open(lifecycle).is_err() {
            return GapOutcome::Skipped(BotError::ValidationFailed(
                "another gap is still under observation".to_string(),
            ));
        }

        if let Some(outcome) = self.observe(cancel).await {
            self.register.clear();
            return outcome;
        }

        match self.register.take_survivor() {
            Some(survivor) => self.place_for(survivor, filters).await,
            None => GapOutcome::Skipped(BotError::ValidationFailed(
                "gap left observation without surviving".to_string(),
            )),
        }
    }

    /// Drive the active gap until it is covered or exhausted.
    /// `Some` short-circuits the gap; `None` means it survived.
    async fn observe(&mut self, cancel: &CancellationToken) -> Option<GapOutcome> {
        while self.register.is_observing() {
            if !sleep_or_cancel(cancel, self.until_next_close()).await {
                return Some(GapOutcome::Stopped);
            }

            let candles = match self.fetch_candles(OBSERVATION_WINDOW, cancel).await {
                Ok(candles) if candles.len() >= OBSERVATION_WINDOW => candles,
                Ok(candles) => {
                    return Some(GapOutcome::Abandoned(BotError::decode(format!(
                        "expected {} candles, got {}",
                        OBSERVATION_WINDOW,
                        candles.len()
                    ))))
                }
                Err(_) if cancel.is_cancelled() => return Some(GapOutcome::Stopped),
                Err(e) => return Some(GapOutcome::Abandoned(e)),
            };
            self.note_forming(&candles);

            let closed = &candles[candles.len() - 2];
            match self.register.advance(closed) {
                None => {
                    tracing::debug!(
                        open_time_ms = closed.open_time_ms,
                        "Closed candle already evaluated, waiting for the exchange to roll over"
                    );
                }
                Some(LifecycleState::Covered) => return Some(GapOutcome::Covered),
                Some(state) => {
                    if let Some(active) = self.register.active() {
                        tracing::debug!(?state, budget = ?active.budget(), gap = ?active.gap(), "Observed candle");
                    }
                }
            }
        }
        None
    }

    async fn place_for(&self, gap: Gap, filters: &InstrumentFilters) -> GapOutcome {
        let asset = self.sizer.balance_asset(gap.kind, filters).to_string();

        let balance = match self.exchange.fetch_balance(&asset).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!("Error getting {} balance, skip gap: {}", asset, e);
                return GapOutcome::Skipped(e);
            }
        };
        tracing::info!(asset = %asset, balance, "Got balance");

        let intent = match self.sizer.size(&gap, balance, &asset) {
            Ok(intent) => intent,
            Err(e) => return GapOutcome::Skipped(e),
        };

        let order = match OrderFilterValidator::new(filters).validate(&intent) {
            Ok(order) => order,
            Err(e) => {
                tracing::info!("Params don't pass filters: {}", e);
                return GapOutcome::Skipped(e);
            }
        };

        let request = order.to_request(&self.trading.symbol);
        match self.exchange.place_order(&request).await {
            Ok(ack) => GapOutcome::OrderPlaced(ack),
            Err(e) => {
                tracing::error!(order_link_id = %request.order_link_id, "Error placing order: {}", e);
                GapOutcome::Skipped(e)
            }
        }
    }

    async fn fetch_candles(&self, limit: usize, cancel: &CancellationToken) -> Result<Vec<Candle>> {
        let exchange = &self.exchange;
        let symbol = &self.trading.symbol;
        let interval = &self.trading.interval;
        retry(&self.retry, cancel, "candle fetch", move || {
            exchange.fetch_candles(symbol, interval, limit)
        })
        .await
    }

    fn note_forming(&mut self, candles: &[Candle]) {
        if let Some(last) = candles.last() {
            self.forming_open_ms = last.open_time_ms;
        }
    }

    fn until_next_close(&self) -> Duration {
        wake_delay(
            self.forming_open_ms,
            self.trading.frame_ms,
            now_ms(),
            self.trading.wake_margin_ms,
        )
    }
}
