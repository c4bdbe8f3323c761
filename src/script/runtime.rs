//! Runtime environment for script execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::gateway::{ActionGateway, OcrHandle};
use crate::script::context::Context;
use crate::script::eval::Evaluator;
use crate::script::functions::FunctionRegistry;
use crate::script::value::Value;
use crate::timing::{self, CancelToken};

/// Callback receiving the human-readable log stream, one line per call.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Tunables of a run, fixed when the engine is built.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Longest uninterrupted sleep; bounds how late a stop takes effect
    pub sleep_slice: Duration,
    /// Pause between samples of a polling wait
    pub poll_interval: Duration,
    /// Budget of `findText` when the script gives none
    pub find_text_timeout: Duration,
    /// Largest accepted screen coordinate
    pub max_coordinate: i32,
    /// Deepest allowed function call nesting
    pub max_call_depth: usize,
    /// Match score `findImage` requires when the script gives none
    pub image_threshold: f64,
}

/// Runtime environment shared by the executor and the command handlers.
pub struct Runtime {
    gateway: Arc<dyn ActionGateway>,
    ocr: Arc<OcrHandle>,
    token: CancelToken,
    config: RunConfig,
    context: Context,
    functions: FunctionRegistry,
    sink: Option<LogSink>,
    loop_depth: usize,
}

impl Runtime {
    /// Create a runtime for one run.
    pub fn new(
        gateway: Arc<dyn ActionGateway>,
        ocr: Arc<OcrHandle>,
        token: CancelToken,
        config: RunConfig,
        sink: Option<LogSink>,
    ) -> Self {
        Self {
            gateway,
            ocr,
            token,
            config,
            context: Context::new(),
            functions: FunctionRegistry::new(),
            sink,
            loop_depth: 0,
        }
    }

    /// Get a reference to the context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Get a mutable reference to the context.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Function definitions of this run.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Replace the function definitions.
    pub fn set_functions(&mut self, functions: FunctionRegistry) {
        self.functions = functions;
    }

    /// Number of `while` loops around the current statement, counted within
    /// the current function call only.
    pub fn loop_depth(&self) -> usize {
        self.loop_depth
    }

    pub(crate) fn set_loop_depth(&mut self, depth: usize) {
        self.loop_depth = depth;
    }

    /// The device backend.
    pub fn gateway(&self) -> &dyn ActionGateway {
        self.gateway.as_ref()
    }

    /// Shared text recognition handle.
    pub fn ocr(&self) -> &OcrHandle {
        &self.ocr
    }

    /// The run's stop flag.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Whether execution must not proceed.
    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Set the stop flag; execution never resumes afterwards.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Evaluator over the current frame.
    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.context, self.should_stop())
    }

    /// Sleep in slices; `false` when interrupted by a stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        timing::sleep(duration, self.config.sleep_slice, &self.token).await
    }

    /// Emit one line of the log stream.
    pub fn log(&self, line: &str) {
        info!(target: "autoscript::log", "{}", line);
        if let Some(sink) = &self.sink {
            sink(line);
        }
    }

    /// Emit a warning to the log stream and as a structured record.
    pub fn warn(&self, line: usize, message: &str) {
        warn!(line, "{}", message);
        if let Some(sink) = &self.sink {
            sink(&format!("Line {}: {}", line, message));
        }
    }

    /// Emit an error to the log stream and as a structured record.
    pub fn error(&self, line: usize, message: &str) {
        error!(line, "{}", message);
        if let Some(sink) = &self.sink {
            sink(&format!("Line {}: {}", line, message));
        }
    }

    /// Extract the top-level variables.
    pub fn into_variables(self) -> HashMap<String, Value> {
        self.context.into_variables()
    }
}
