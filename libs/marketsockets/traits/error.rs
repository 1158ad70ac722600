use thiserror::Error;

/// Errors from the socket client
///
/// Transport failures after the first connect are retried internally and
/// only surface through [`ClientEvent::Error`](crate::ClientEvent); these
/// variants are what callers see from commands and the builder.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Not a `{event, data}` frame
    #[error("Frame error: {0}")]
    Frame(String),

    /// The client task has exited
    #[error("Client task unavailable: {0}")]
    ChannelSend(String),

    /// Bad URL or header
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    #[error("Client is shut down")]
    ShutDown,
}

impl From<serde_json::Error> for SocketError {
    fn from(e: serde_json::Error) -> Self {
        SocketError::Frame(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SocketError>;
