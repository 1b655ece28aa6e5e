//! Event body handling contract.

use thiserror::Error;
use upnp_model::StateVariableValue;

/// A NOTIFY body that could not be interpreted.
#[derive(Error, Debug)]
#[error("malformed event body: {0}")]
pub struct BodyError(pub String);

/// Encodes and decodes GENA event bodies.
///
/// The XML propertyset work lives outside this crate; the engine only
/// moves opaque text bodies through this trait. Decoded values arrive as
/// text, the wire does not carry type information.
pub trait EventBodyProcessor: Send + Sync {
    fn write_body(&self, changes: &[StateVariableValue]) -> String;

    fn read_body(&self, body: &str) -> Result<Vec<StateVariableValue>, BodyError>;
}
