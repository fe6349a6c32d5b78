/// Failures of the underlying session transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The peer closed the session or the stream ended.
    #[error("session closed")]
    Closed,
    /// The transport reported an error while receiving or sending.
    #[error("session transport error: {0}")]
    Transport(String),
}

/// Errors produced by one orchestration attempt.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to resolve cluster connection for context {context:?}: {message}")]
    Resolve { context: String, message: String },

    #[error("exec setup failed: {0}")]
    Setup(String),

    #[error("remote stream failed: {0}")]
    Stream(String),

    #[error("session interrupted")]
    Cancelled,
}

impl BridgeError {
    /// Whether a failed primary attempt should be retried with the fallback command.
    /// Resolution, session and cancellation failures are final.
    pub fn should_fall_back(&self) -> bool {
        matches!(self, BridgeError::Setup(_) | BridgeError::Stream(_))
    }
}
