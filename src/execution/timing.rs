use crate::config::RetryPolicy;
use crate::Result;
use std::future::Future;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Time from `now_ms` until the candle opened at `open_time_ms` closes, plus `margin_ms`
///
/// A close already in the past counts as zero, so the result is never below the margin.
pub fn wake_delay(open_time_ms: i64, frame_ms: i64, now_ms: i64, margin_ms: i64) -> Duration {
    let until_close = (open_time_ms + frame_ms - now_ms).max(0);
    Duration::from_millis((until_close + margin_ms.max(0)) as u64)
}

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let delay = policy.base_delay_ms.saturating_mul(factor).min(policy.max_delay_ms);
    Duration::from_millis(delay)
}

/// Sleep unless cancelled first. Returns `false` if cancellation won.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Run `op`, retrying transient failures with exponential backoff
///
/// Permanent errors, the final transient error, and cancellation during a
/// backoff all return the most recent error.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    "{} failed: {}, retrying in {:?} (attempt {}/{})",
                    what,
                    e,
                    delay,
                    attempt,
                    policy.max_attempts
                );
                if !sleep_or_cancel(cancel, delay).await {
                    return Err(e);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
