//! Error taxonomy shared by every client component.
//!
//! Library code returns [`ClientError`]; the CLI and web glue wrap it in
//! `anyhow` with context before presenting it.

/// Errors raised while talking to the coverage backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Transport failure or a non-2xx response.
    #[error("network error on {path}: {reason}")]
    Network { path: String, reason: String },

    /// The backend answered, but the body is malformed or lacks a field
    /// the client depends on.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The user explicitly cancelled the operation.
    #[error("cancelled by user")]
    UserCancelled,

    /// An operation referenced a session that is no longer the active one.
    #[error("stale session '{given}' (active session is '{active}')")]
    StaleSession { given: String, active: String },

    /// An operation needs an active session but none has been started.
    #[error("no active session")]
    NoActiveSession,

    /// The request was rejected locally before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn network(path: &str, reason: impl Into<String>) -> Self {
        Self::Network {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Usage errors are programming mistakes, not backend failures.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::StaleSession { .. } | Self::NoActiveSession)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
