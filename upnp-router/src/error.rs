use thiserror::Error;

/// Errors surfaced by the router and its transports.
#[derive(Error, Debug)]
pub enum RouterError {
    /// A single transport failed to send; other transports continue
    #[error("transport send failed: {0}")]
    Send(#[from] std::io::Error),

    /// The router has been shut down
    #[error("router is shut down")]
    ShutDown,
}

/// Result type for router operations
pub type Result<T> = std::result::Result<T, RouterError>;
