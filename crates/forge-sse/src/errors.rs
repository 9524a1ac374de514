use thiserror::Error;

/// Failure to decode a single frame into an event.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is empty")]
    EmptyInput,
}

/// Failure raised by an [`HttpTransport`](crate::transport::HttpTransport)
/// before a response body is available.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Terminal value delivered once per session on its error channel.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("non-success status code from stream: {status}")]
    Status { status: u16 },
    #[error("stream read failed: {0}")]
    Read(String),
    #[error("event frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
    /// The remote end finished the body without an I/O error.
    #[error("stream has closed")]
    StreamClosed,
}

impl StreamError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::StreamClosed)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(error: std::io::Error) -> Self {
        Self::Read(error.to_string())
    }
}
