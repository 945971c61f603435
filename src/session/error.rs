//! Session error kinds

/// Errors that can end or prevent a voice session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to get signed url: {0}")]
    CredentialFetchFailed(String),

    #[error("failed to establish voice session: {0}")]
    SessionEstablishFailed(String),

    #[error("voice session error: {0}")]
    SessionRuntimeError(String),
}

impl SessionError {
    /// Text shown to the person in front of the kiosk
    pub fn alert_message(&self) -> &'static str {
        match self {
            SessionError::PermissionDenied => {
                "Microphone permission is required for the conversation."
            }
            SessionError::CredentialFetchFailed(_) | SessionError::SessionEstablishFailed(_) => {
                "Failed to start conversation. Please try again."
            }
            SessionError::SessionRuntimeError(_) => "An error occurred during the conversation.",
        }
    }
}
