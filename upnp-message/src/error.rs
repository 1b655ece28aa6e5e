use thiserror::Error;

/// Errors produced while parsing or formatting wire messages.
#[derive(Error, Debug)]
pub enum MessageError {
    /// A header value did not match its expected wire form
    #[error("invalid {name} header value: {value}")]
    InvalidHeader { name: String, value: String },

    /// The first line of a message was not a known request or status line
    #[error("invalid start line: {0}")]
    InvalidStartLine(String),

    /// The header section of a message was not valid UTF-8
    #[error("message header section is not valid UTF-8")]
    InvalidUtf8,

    /// The message ended before the header section was complete
    #[error("truncated message")]
    Truncated,
}

/// Result type for message operations
pub type Result<T> = std::result::Result<T, MessageError>;
