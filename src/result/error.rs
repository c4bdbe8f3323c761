//! Error types for autoscript

use std::time::Duration;
use thiserror::Error;

/// Errors reported by an [`ActionGateway`](crate::ActionGateway) backend.
///
/// None of these abort a run. The engine logs them and the command that hit
/// them returns its "no result" sentinel (`false`, `null` or an empty string).
///
/// # Examples
///
/// ```
/// use autoscript::GatewayError;
///
/// let err = GatewayError::RecognizerInit("model missing".to_string());
/// assert_eq!(err.to_string(), "Text recognizer failed to initialize: model missing");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The backend is not connected or lacks the permission it needs.
    #[error("Action gateway is not ready")]
    NotReady,

    /// The text recognizer could not be created.
    #[error("Text recognizer failed to initialize: {0}")]
    RecognizerInit(String),

    /// The text recognition handle was closed before the query ran.
    #[error("Text recognizer has been closed")]
    Closed,

    /// Text recognition did not answer within its bound.
    #[error("Text recognition timed out (after {duration:?})")]
    RecognitionTimeout {
        /// The bound that elapsed
        duration: Duration,
    },

    /// The backend tried to perform the action and failed.
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// The backend does not implement this primitive.
    #[error("Unsupported action: {0}")]
    Unsupported(&'static str),
}

/// Errors produced while parsing a color literal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    /// Hex literal with the wrong number of digits.
    #[error("Invalid hex color '{0}' (expected #RRGGBB or #AARRGGBB)")]
    InvalidHex(String),

    /// Neither a hex literal nor a packed integer.
    #[error("Invalid color '{0}'")]
    Invalid(String),
}
