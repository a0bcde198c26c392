use thiserror::Error;

/// Failures surfaced by the session transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Credential missing or rejected by the far end. Fatal to the session.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Connection dropped or could not be established. A fresh connect may succeed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The far end reported a problem on a live connection.
    #[error("server error: {0}")]
    Server(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Classify an `error` frame or close reason sent by the messaging endpoint.
    pub fn from_server_reason(reason: &str) -> Self {
        let lower = reason.to_ascii_lowercase();
        if lower.contains("auth")
            || lower.contains("token")
            || lower.contains("credential")
            || lower.contains("forbidden")
        {
            Self::Authentication(reason.to_string())
        } else {
            Self::Server(reason.to_string())
        }
    }
}

/// Local validation failures of the outbound composer. Never reach the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("message text is empty")]
    EmptyText,
    #[error("no active conversation")]
    NoActiveConversation,
}

/// Failures of the CRUD backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("audible cue failed: {0}")]
    Audio(String),
    #[error("desktop notification failed: {0}")]
    Desktop(String),
}
