use thiserror::Error;

/// Errors raised by the local service model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A value was supplied for a variable the service never declared
    #[error("service has no state variable named {0}")]
    UnknownVariable(String),

    /// A value did not match its variable's declared kind
    #[error("value for {variable} is not {expected}")]
    KindMismatch {
        variable: String,
        expected: &'static str,
    },

    /// Reading the current evented values failed
    #[error("state snapshot failed: {0}")]
    SnapshotFailed(String),
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
