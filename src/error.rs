//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single error sink rejected an insert or query.
    #[error("error sink '{sink}' failed: {message}")]
    Persistence { sink: String, message: String },

    /// A [`SinkChain`](crate::sink::SinkChain) with no sinks was asked to persist or query.
    #[error("no error sink configured")]
    NoSink,
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
