/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mtbridge_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mtbridge_frame::FrameError),

    /// Decoding, routing or buffer error.
    #[error(transparent)]
    Exchange(#[from] mtbridge_exchange::ExchangeError),

    /// The connection broke protocol and was closed; no reply is owed.
    #[error("connection dropped: {0}")]
    ConnectionDropped(#[source] mtbridge_frame::FrameError),

    /// The peer is gone; any reply owed to it was discarded.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// The call breaks strict request/reply alternation.
    #[error("out of sequence: {0}")]
    OutOfSequence(&'static str),
}

pub type Result<T> = std::result::Result<T, EndpointError>;
