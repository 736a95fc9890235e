use thiserror::Error;

/// Errors from LLM provider calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got a response (connect failure, timeout).
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
