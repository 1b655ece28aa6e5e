use thiserror::Error;

/// Why a SUBSCRIBE exchange did not produce an established subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstablishFailure {
    /// No response at all (transport failure or timeout)
    #[error("no response from device")]
    NoResponse,

    /// The device answered with a non-success status
    #[error("device rejected subscription with status {0}")]
    ErrorResponse(u16),

    /// The device answered 2xx but without the required SID/TIMEOUT
    #[error("device response was missing required subscription headers")]
    MalformedResponse,
}

/// Errors surfaced by the eventing engine.
#[derive(Error, Debug)]
pub enum GenaError {
    /// Reading the initial service snapshot failed
    #[error("initial snapshot failed: {0}")]
    Snapshot(#[from] upnp_model::ModelError),

    #[error("subscription could not be established: {0}")]
    Establish(#[from] EstablishFailure),

    /// The subscription has already ended
    #[error("subscription has ended")]
    Ended,
}

/// Result type for eventing operations
pub type Result<T> = std::result::Result<T, GenaError>;
