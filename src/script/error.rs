//! Error types for script execution.

use crate::result::GatewayError;
use thiserror::Error;

/// Errors raised while executing a single statement.
///
/// The executor catches every one of these at the line boundary, logs it with
/// the line number and moves on to the next line; none of them ends a run.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// An argument failed range, type or format validation.
    #[error("{command}: {message}")]
    Validation {
        /// Command being validated
        command: &'static str,
        /// What was wrong
        message: String,
    },

    /// Wrong number of arguments for a built-in.
    #[error("{command} expects {expected} arguments, got {got}")]
    Arity {
        /// Command being called
        command: &'static str,
        /// Accepted argument counts
        expected: &'static str,
        /// Count supplied
        got: usize,
    },

    /// Call to a name that is neither a built-in nor a defined function.
    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    /// Function calls nested deeper than the configured limit.
    #[error("Maximum call depth {0} exceeded")]
    CallDepthExceeded(usize),

    /// A line the dispatcher does not recognize.
    #[error("Unrecognized statement: {0}")]
    Unrecognized(String),

    /// Error from the action gateway.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Script file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Build a validation error.
    pub(crate) fn invalid(command: &'static str, message: impl Into<String>) -> Self {
        ScriptError::Validation {
            command,
            message: message.into(),
        }
    }
}
