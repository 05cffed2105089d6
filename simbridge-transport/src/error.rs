//! Errors raised while reading rosbridge frames.

use simbridge_sdk::TransportError;
use thiserror::Error;

/// A frame arrived that does not follow the rosbridge protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The frame has no `op` field.
    #[error("frame has no `op` field")]
    MissingOp,

    /// A field the operation requires is absent or has the wrong type.
    #[error("`{op}` frame is missing `{field}`")]
    MissingField { op: String, field: &'static str },

    /// The length prefix is outside what a BSON document may declare.
    #[error("frame length {0} is out of range")]
    BadLength(i64),

    /// The stream ended partway through a length prefix.
    #[error("stream ended after {0} of 4 length bytes")]
    TruncatedLength(usize),

    /// The bytes are not a valid BSON document.
    #[error("invalid BSON: {0}")]
    InvalidDocument(String),
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        TransportError::Protocol(err.to_string())
    }
}
