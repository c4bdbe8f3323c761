//! Script engine: runs scripts against an action gateway

mod builder;

pub use builder::EngineBuilder;

use crate::gateway::{ActionGateway, OcrHandle};
use crate::result::{RunReport, RunStatus};
use crate::script::interpreter;
use crate::script::runtime::{LogSink, RunConfig, Runtime};
use crate::script::Script;
use crate::timing::CancelToken;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Runs automation scripts against an [`ActionGateway`].
///
/// An engine runs one script at a time; a second `execute` waits for the
/// first to finish. Every run starts from an empty Variable Store and a
/// cleared stop flag, and always closes the text recognition handle on the
/// way out, whether it completed, was stopped or crashed.
///
/// # Examples
///
/// ```
/// use autoscript::{Engine, RecordedAction, RecordingGateway, Point};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gateway = Arc::new(RecordingGateway::new());
/// let engine = Engine::builder().build(gateway.clone());
///
/// let report = engine.execute("click(10, 10)\nlog(\"done\")").await;
///
/// assert!(report.is_completed());
/// assert_eq!(gateway.actions(), vec![RecordedAction::Click(Point::new(10, 10))]);
/// # }
/// ```
pub struct Engine {
    gateway: Arc<dyn ActionGateway>,
    ocr: Arc<OcrHandle>,
    token: CancelToken,
    config: RunConfig,
    sink: Option<LogSink>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine with default configuration.
    pub fn new(gateway: Arc<dyn ActionGateway>) -> Self {
        EngineBuilder::new().build(gateway)
    }

    /// Run a script to completion or until stopped.
    ///
    /// Never fails: errors on individual lines are logged and skipped, and a
    /// panic escaping the interpreter is reported as
    /// [`RunStatus::Crashed`].
    pub async fn execute(&self, source: &str) -> RunReport {
        self.execute_script(&Script::new(source)).await
    }

    /// Run an already normalized script.
    pub async fn execute_script(&self, script: &Script) -> RunReport {
        let _running = self.run_lock.lock().await;
        self.token.reset();

        if !self.gateway.is_ready() {
            warn!("Action gateway is not ready; device commands will fail");
        }
        info!(lines = script.lines().len(), "Script run started");

        let mut runtime = Runtime::new(
            self.gateway.clone(),
            self.ocr.clone(),
            self.token.clone(),
            self.config.clone(),
            self.sink.clone(),
        );

        let outcome = AssertUnwindSafe(interpreter::run(script.lines(), &mut runtime))
            .catch_unwind()
            .await;

        // Cleanup runs whatever the outcome.
        self.ocr.close().await;

        let status = match outcome {
            Ok(_) if self.token.is_cancelled() => RunStatus::Stopped,
            Ok(_) => RunStatus::Completed,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(error = %message, "Script run crashed");
                if let Some(sink) = &self.sink {
                    sink(&format!("Fatal error: {}", message));
                }
                RunStatus::Crashed(message)
            }
        };
        info!(status = ?status, "Script run finished");

        RunReport {
            status,
            variables: runtime.into_variables(),
        }
    }

    /// Start a run on its own task.
    ///
    /// ```no_run
    /// use autoscript::{Engine, RecordingGateway};
    /// use std::sync::Arc;
    ///
    /// # async fn example() {
    /// let engine = Arc::new(Engine::new(Arc::new(RecordingGateway::new())));
    /// let run = Engine::spawn(&engine, "while (true) { sleep(1000) }");
    ///
    /// engine.stop();
    /// let report = run.await.unwrap();
    /// # }
    /// ```
    pub fn spawn(engine: &Arc<Self>, source: impl Into<String>) -> JoinHandle<RunReport> {
        let engine = engine.clone();
        let source = source.into();
        tokio::spawn(async move { engine.execute(&source).await })
    }

    /// Request the current run to stop.
    ///
    /// Safe to call from any thread. The run observes the request at its
    /// next statement, loop iteration or sleep slice.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// A handle on the stop flag, for controllers that outlive a borrow of
    /// the engine.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Stop any run and release the text recognition handle.
    ///
    /// Idempotent, and safe during or after a run.
    pub async fn close(&self) {
        self.token.cancel();
        self.ocr.close().await;
    }

    /// [`close`](Self::close) for synchronous callers outside the async
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn close_blocking(&self) {
        self.token.cancel();
        self.ocr.close_blocking();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Point, RecordedAction, RecordingGateway};
    use crate::script::Value;
    use std::time::Duration;

    fn engine(gateway: Arc<RecordingGateway>) -> Engine {
        Engine::builder()
            .sleep_slice(Duration::from_millis(10))
            .poll_interval(Duration::from_millis(10))
            .build(gateway)
    }

    #[tokio::test]
    async fn test_execute_reports_variables() {
        let engine = engine(Arc::new(RecordingGateway::new()));
        let report = engine.execute("x = 2 + 3\nname = \"bot\"").await;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.variable("x"), Some(&Value::Number(5.0)));
        assert_eq!(report.variable("name"), Some(&Value::from("bot")));
    }

    #[tokio::test]
    async fn test_each_run_starts_clean() {
        let engine = engine(Arc::new(RecordingGateway::new()));
        engine.execute("a = 1\nEXIT = true").await;

        let report = engine.execute("b = 2").await;
        assert!(report.is_completed());
        assert!(report.variable("a").is_none());
    }

    #[tokio::test]
    async fn test_stop_before_line_dispatch() {
        let gateway = Arc::new(RecordingGateway::new());
        let engine = engine(gateway.clone());
        let report = engine.execute("click(1, 1)\nreturn\nclick(2, 2)").await;
        assert_eq!(report.status, RunStatus::Stopped);
        assert_eq!(gateway.actions(), vec![RecordedAction::Click(Point::new(1, 1))]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
