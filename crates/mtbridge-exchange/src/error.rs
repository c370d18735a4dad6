/// Errors raised by the exchange layer.
///
/// None of these leave a buffer or the registry partially updated.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Wire data does not match the `[ints, reals, texts]` shape or element types.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An allocation or a configured limit was exhausted.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The handle does not designate a live indicator.
    #[error("invalid indicator handle {0}")]
    InvalidHandle(i64),

    /// The caller-provided destination cannot hold the data.
    #[error("destination too small (needed {needed}, capacity {capacity})")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
