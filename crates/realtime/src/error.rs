use crate::session::SessionState;

/// Failures while establishing or using the realtime transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to fetch access token: {0}")]
    Credential(String),
    #[error("Microphone access failed: {0}")]
    MediaAccess(String),
    #[error("Session description exchange failed: {0}")]
    Signaling(String),
    #[error("Remote answer is not a session description")]
    InvalidAnswer,
    #[error("Peer connection error: {0}")]
    Peer(String),
    #[error("Data channel error: {0}")]
    Channel(String),
}

/// Errors surfaced by the session lifecycle controller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A voice session is already {0}")]
    AlreadyStarted(SessionState),
    #[error("Failed to start voice session: {0}")]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// A short, actionable message suitable for showing to the kiosk user.
    pub fn user_hint(&self) -> &'static str {
        match self {
            SessionError::AlreadyStarted(_) => "Voice ordering is already running.",
            SessionError::Transport(TransportError::MediaAccess(_)) => {
                "Check microphone permission and retry."
            }
            SessionError::Transport(TransportError::Credential(_)) => {
                "Could not reach the ordering service. Please retry in a moment."
            }
            SessionError::Transport(_) => "Voice connection failed. Please retry.",
        }
    }
}
