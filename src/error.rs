//! Error types for the rovercam client

/// Result type alias using the rovercam Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while connecting to and streaming from a car
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Control channel failed to open
    #[error("Connect error: {0}")]
    Connect(String),

    /// Signaling envelope could not be serialized or transmitted
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Offer/answer negotiation failure
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Drive command delivery failure
    #[error("Command delivery error: {0}")]
    Command(String),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable
    ///
    /// Connect and command failures are transient: the caller may retry with
    /// a fresh attempt. Negotiation failures are not retryable in place; the
    /// session must be discarded and rebuilt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connect(_) | Error::Command(_) | Error::Io(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error terminates the owning session
    ///
    /// A terminal error means the ControlChannel or MediaSession that
    /// produced it is unusable and must be recreated.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Negotiation(_) | Error::WebRtc(_))
    }
}
