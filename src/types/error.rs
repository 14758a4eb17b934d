use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur when using the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed host)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error while reading a persisted token
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel name outside the supported set
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// The client driver has been shut down
    #[error("Client has been shut down")]
    ClientShutdown,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
