use thiserror::Error;

/// Errors raised by the peer link core.
///
/// Transport failures never escape the lifecycle manager as `Err` values;
/// they are logged and surfaced through handler callbacks. The remaining
/// variants are returned from pipeline and configuration entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("unexpected disconnect from endpoint {0}")]
    UnexpectedDisconnect(String),

    #[error("audio i/o failure: {0}")]
    AudioIo(String),

    #[error("malformed control message: {0}")]
    MalformedControlMessage(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("session closed")]
    SessionClosed,
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::AudioIo(e.to_string())
    }
}
