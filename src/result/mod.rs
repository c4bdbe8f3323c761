//! Result types for script runs

mod error;

pub use error::{ColorError, GatewayError};

use crate::script::Value;
use std::collections::HashMap;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Every line was executed.
    Completed,

    /// The cancellation token was observed: `Engine::stop`, `EXIT = true`,
    /// or `return`.
    Stopped,

    /// A panic escaped the interpreter. Cleanup still ran.
    Crashed(String),
}

/// Outcome of [`Engine::execute`](crate::Engine::execute).
///
/// `execute` never returns an error. Failures during a run surface only
/// through the log stream; the report says how the run ended and what the
/// top-level variables held at that point.
///
/// # Examples
///
/// ```no_run
/// use autoscript::{Engine, RecordingGateway, RunStatus};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let engine = Engine::builder().build(Arc::new(RecordingGateway::new()));
/// let report = engine.execute("x = 2 + 3").await;
///
/// assert_eq!(report.status, RunStatus::Completed);
/// assert_eq!(report.variable("x").map(|v| v.as_string()), Some("5".to_string()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended.
    pub status: RunStatus,

    /// Top-level Variable Store at the end of the run.
    pub variables: HashMap<String, Value>,
}

impl RunReport {
    /// Look up a top-level variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Whether the run exhausted its script.
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
