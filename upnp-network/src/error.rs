use thiserror::Error;

/// Errors raised while discovering local network addresses.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// No bindable, non-loopback IPv4 address was found; the stack
    /// cannot run without at least one.
    #[error("no usable network interface with a bindable IPv4 address")]
    NoUsableInterface,

    /// The named interface has no address of the requested family.
    #[error("interface {interface} has no {family} address")]
    NoAddressForInterface {
        interface: String,
        family: &'static str,
    },

    /// The platform interface enumeration itself failed.
    #[error("failed to enumerate network interfaces: {0}")]
    Enumeration(#[from] std::io::Error),
}

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
