//! Cancellation-aware waiting
//!
//! Every suspension point of a run goes through this module: chunked sleeps
//! and the bounded polling used by `waitForColor`, `waitForText` and
//! `findText`. Both re-check the [`CancelToken`] between slices so a stop
//! request takes effect within one slice.

mod cancel;

pub use cancel::CancelToken;

use std::time::{Duration, Instant};

/// Sleep for `duration` in slices of at most `slice`.
///
/// Returns `true` if the full duration elapsed, `false` if the token was
/// cancelled first.
pub async fn sleep(duration: Duration, slice: Duration, token: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let step = (deadline - now).min(slice);
        tokio::time::sleep(step).await;
    }
}

/// Elapsed-time budget for a polling wait.
///
/// ```
/// use autoscript::{timing::PollTimer, CancelToken};
/// use std::time::Duration;
///
/// # async fn example() {
/// let token = CancelToken::new();
/// let mut timer = PollTimer::new(Duration::from_millis(300), Duration::from_millis(100));
/// let mut polls = 0;
/// loop {
///     polls += 1;
///     // sample the screen here
///     if !timer.next(&token, Duration::from_millis(50)).await {
///         break;
///     }
/// }
/// assert!(polls >= 1);
/// # }
/// ```
#[derive(Debug)]
pub struct PollTimer {
    started: Instant,
    budget: Duration,
    interval: Duration,
}

impl PollTimer {
    /// Start a budget of `budget`, polling every `interval`.
    pub fn new(budget: Duration, interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            interval,
        }
    }

    /// Time spent since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wait for the next poll.
    ///
    /// Returns `false` when the budget is exhausted or the token is cancelled;
    /// the caller then reports its "not found" sentinel.
    pub async fn next(&mut self, token: &CancelToken, slice: Duration) -> bool {
        if token.is_cancelled() || self.elapsed() >= self.budget {
            return false;
        }
        let remaining = self.budget.saturating_sub(self.elapsed());
        sleep(self.interval.min(remaining), slice, token).await && !token.is_cancelled()
    }
}
