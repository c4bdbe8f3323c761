//! Cooperative cancellation token

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared stop flag for one script run (the `EXIT` flag).
///
/// Clones share the same flag, so a controller on another thread or task can
/// stop a run it does not own. Reading never takes a lock.
///
/// # Examples
///
/// ```
/// use autoscript::CancelToken;
///
/// let token = CancelToken::new();
/// let controller = token.clone();
///
/// assert!(!token.is_cancelled());
/// controller.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag before a new run starts.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Resolve once the token is cancelled, checking every `slice`.
    pub async fn cancelled(&self, slice: Duration) {
        while !self.is_cancelled() {
            tokio::time::sleep(slice).await;
        }
    }
}
