//! Error types of the bridge
//!
//! Session failures never escape the supervisor; they are turned into state
//! transitions. Only intent misuse is reported back to the caller.

use std::time::Duration;

/// Failure reported by the game-session client
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Session closed")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
}

/// Failure reported by the status surface
#[derive(Debug, Clone, thiserror::Error)]
pub enum SurfaceError {
    #[error("Status surface request failed: {0}")]
    Request(String),
    #[error("Unexpected status surface response: {0}")]
    Response(String),
    /// The post no longer exists on the surface
    #[error("Status post not found: {0}")]
    NotFound(String),
    #[error("Status surface did not answer within {0:?}")]
    Timeout(Duration),
}

/// Rejection of an operator intent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("Not connected to the game world")]
    NotConnected,
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),
    #[error("Chat delivery failed: {0}")]
    SendFailed(String),
    #[error("Bridge is shut down")]
    BridgeClosed,
}

impl IntentError {
    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::InvalidIntent(_) => "INVALID_INTENT",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::BridgeClosed => "BRIDGE_CLOSED",
        }
    }
}
