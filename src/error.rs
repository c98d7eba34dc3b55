//! Error types for the render pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, rendering, or caching a card
#[derive(Error, Debug)]
pub enum Error {
    /// The content API marked the requested title as missing
    #[error("Page not found: {0}")]
    PageNotFound(String),

    /// Transport failure or non-success response from the content/image/listing APIs
    #[error("Upstream API error: {0}")]
    UpstreamApi(String),

    /// A renderer operation did not complete within the configured timeout
    #[error("Render timed out after {0}ms")]
    RenderTimeout(u64),

    /// The renderer reported a failed navigation or capture
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    /// Failed to read or write a cached bitmap
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// Failed to initialize a component
    #[error("Initialization failed: {0}")]
    Init(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::RenderFailure(err.to_string())
    }
}
