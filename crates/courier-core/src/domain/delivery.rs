//! Delivery outcome model: how a single attempt ended.
//!
//! The transport reports `Result<(), DeliveryError>`; the scheduler only ever
//! looks at the classified `DeliveryOutcome`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The event could not be turned into a request.
///
/// Rendering is pure: the event is dropped, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render failed: {reason}")]
pub struct RenderError {
    pub reason: String,
}

impl RenderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure reported by a transport.
///
/// `recoverable` decides between "retry the same head later" and
/// "drop the head now".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery failed (recoverable={recoverable}): {message}")]
pub struct DeliveryError {
    pub recoverable: bool,
    pub message: String,
}

impl DeliveryError {
    /// Network / server transient class (timeouts, 5xx, no connectivity).
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            recoverable: true,
            message: message.into(),
        }
    }

    /// The collector will never accept this exact request (4xx class).
    pub fn non_recoverable(message: impl Into<String>) -> Self {
        Self {
            recoverable: false,
            message: message.into(),
        }
    }
}

/// Classification of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    Success,
    RecoverableFailure,
    NonRecoverableFailure,
}

impl DeliveryOutcome {
    pub fn classify(result: &Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Success,
            Err(e) if e.recoverable => DeliveryOutcome::RecoverableFailure,
            Err(_) => DeliveryOutcome::NonRecoverableFailure,
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, DeliveryOutcome::Success)
    }
}
