//! Lock-guarded text recognition handle

use crate::gateway::{ActionGateway, Screenshot, TextBlock, TextRecognizer};
use crate::result::GatewayError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared text recognition session for a run.
///
/// The recognizer is created on first use and kept until [`close`](Self::close).
/// Creation, queries and close all hold the same lock, so a teardown issued
/// from another task waits for an in-flight query instead of pulling the
/// session out from under it. Closing is idempotent; a query issued after a
/// close opens a fresh session.
pub struct OcrHandle {
    recognizer: Mutex<Option<Arc<dyn TextRecognizer>>>,
    bound: Duration,
}

impl OcrHandle {
    /// Create an empty handle whose queries wait at most `bound`.
    pub fn new(bound: Duration) -> Self {
        Self {
            recognizer: Mutex::new(None),
            bound,
        }
    }

    /// Recognize the text in `image`, opening a session through `gateway` if
    /// none is open.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::RecognizerInit`] (or whatever the gateway returns)
    ///   when the session cannot be opened
    /// - [`GatewayError::RecognitionTimeout`] when the recognizer does not
    ///   answer within the bound
    pub async fn recognize(
        &self,
        gateway: &dyn ActionGateway,
        image: Screenshot,
    ) -> Result<Vec<TextBlock>, GatewayError> {
        let mut guard = self.recognizer.lock().await;

        let recognizer = match guard.as_ref() {
            Some(recognizer) => recognizer.clone(),
            None => {
                debug!("Opening text recognizer");
                let recognizer = gateway.text_recognizer()?;
                *guard = Some(recognizer.clone());
                recognizer
            }
        };

        match tokio::time::timeout(self.bound, recognizer.recognize(image)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::RecognitionTimeout {
                duration: self.bound,
            }),
        }
    }

    /// Close the session if one is open.
    pub async fn close(&self) {
        let mut guard = self.recognizer.lock().await;
        if let Some(recognizer) = guard.take() {
            debug!("Closing text recognizer");
            recognizer.close();
        }
    }

    /// Close from synchronous code running outside the async runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context; use
    /// [`close`](Self::close) there.
    pub fn close_blocking(&self) {
        let mut guard = self.recognizer.blocking_lock();
        if let Some(recognizer) = guard.take() {
            debug!("Closing text recognizer");
            recognizer.close();
        }
    }

    /// Whether a session is currently open.
    pub async fn is_open(&self) -> bool {
        self.recognizer.lock().await.is_some()
    }
}
