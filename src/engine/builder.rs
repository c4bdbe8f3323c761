//! Engine builder for configuration

use crate::engine::Engine;
use crate::gateway::{ActionGateway, OcrHandle};
use crate::script::runtime::{LogSink, RunConfig};
use crate::timing::CancelToken;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default longest uninterrupted sleep slice (in milliseconds)
const DEFAULT_SLEEP_SLICE_MS: u64 = 50;

/// Default pause between polls of a waiting command (in milliseconds)
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default bound on one text recognition (in seconds)
const DEFAULT_OCR_TIMEOUT_SECS: u64 = 5;

/// Default `findText` budget (in milliseconds)
const DEFAULT_FIND_TEXT_TIMEOUT_MS: u64 = 3000;

/// Default largest accepted coordinate
const DEFAULT_MAX_COORDINATE: i32 = 10_000;

/// Default deepest function call nesting
const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Default `findImage` match threshold
const DEFAULT_IMAGE_THRESHOLD: f64 = 0.9;

/// Builder for configuring engines.
///
/// # Defaults
///
/// - Sleep slice: 50 ms
/// - Poll interval: 100 ms
/// - Text recognition bound: 5 seconds
/// - `findText` budget: 3 seconds
/// - Maximum coordinate: 10 000
/// - Maximum call depth: 64
/// - `findImage` threshold: 0.9
///
/// # Examples
///
/// ```
/// use autoscript::{Engine, RecordingGateway};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let engine = Engine::builder()
///     .poll_interval(Duration::from_millis(50))
///     .max_coordinate(4096)
///     .on_log(|line| println!("{}", line))
///     .build(Arc::new(RecordingGateway::new()));
/// ```
#[derive(Clone)]
pub struct EngineBuilder {
    config: RunConfig,
    ocr_timeout: Duration,
    sink: Option<LogSink>,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("ocr_timeout", &self.ocr_timeout)
            .field("on_log", &self.sink.is_some())
            .finish()
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Create a new engine builder with default configuration.
    ///
    /// See the [`EngineBuilder`] documentation for default values.
    pub fn new() -> Self {
        Self {
            config: RunConfig {
                sleep_slice: Duration::from_millis(DEFAULT_SLEEP_SLICE_MS),
                poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
                find_text_timeout: Duration::from_millis(DEFAULT_FIND_TEXT_TIMEOUT_MS),
                max_coordinate: DEFAULT_MAX_COORDINATE,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                image_threshold: DEFAULT_IMAGE_THRESHOLD,
            },
            ocr_timeout: Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
            sink: None,
        }
    }

    /// Set the longest uninterrupted sleep.
    ///
    /// A stop request takes effect within one slice, so smaller slices make
    /// `sleep` and the polling waits more responsive.
    pub fn sleep_slice(mut self, slice: Duration) -> Self {
        self.config.sleep_slice = slice.max(Duration::from_millis(1));
        self
    }

    /// Set the pause between samples of `waitForColor`, `waitForText` and
    /// `findText`.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the upper bound on a single text recognition.
    pub fn ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    /// Set the budget `findText` uses when the script gives none.
    pub fn find_text_timeout(mut self, timeout: Duration) -> Self {
        self.config.find_text_timeout = timeout;
        self
    }

    /// Set the largest coordinate accepted by device commands.
    ///
    /// # Arguments
    ///
    /// * `max` - Inclusive bound for both axes (default: 10 000)
    pub fn max_coordinate(mut self, max: i32) -> Self {
        self.config.max_coordinate = max;
        self
    }

    /// Set the deepest allowed function call nesting.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    /// Set the match score `findImage` requires when the script gives none.
    pub fn image_threshold(mut self, threshold: f64) -> Self {
        self.config.image_threshold = threshold;
        self
    }

    /// Receive the human-readable log stream.
    ///
    /// The callback gets one line per executed action, per `log` statement
    /// and per diagnostic. It runs on the task executing the script.
    pub fn on_log<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(callback));
        self
    }

    /// Build an engine driving `gateway`.
    pub fn build(self, gateway: Arc<dyn ActionGateway>) -> Engine {
        Engine {
            gateway,
            ocr: Arc::new(OcrHandle::new(self.ocr_timeout)),
            token: CancelToken::new(),
            config: self.config,
            sink: self.sink,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }
}
