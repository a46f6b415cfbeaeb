//! Error types for the correlation layer.

/// Why one call failed.
///
/// Connection loss fails every pending call at once, so this type stays
/// `Clone` and carries transport detail as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// No reply arrived before the request's expiration.
    #[error("timed out waiting for a reply to {message_type}")]
    Timeout { message_type: String },
    /// The connection ended before a reply arrived.
    #[error("connection closed")]
    ConnectionClosed,
    /// The transport failed underneath the call.
    #[error("transport error: {0}")]
    Transport(String),
    /// The request could not be serialized; nothing was sent.
    #[error("could not encode request: {0}")]
    Encoding(String),
    /// A reply arrived but its body was not the shape the caller expected.
    #[error("unexpected reply to {message_type}: {detail}")]
    UnexpectedReply {
        message_type: String,
        detail: String,
    },
}

/// Why connecting or driving the connection failed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}
