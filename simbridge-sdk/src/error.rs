//! Error types for conversion, registry lookups, transports and channels.
//!
//! Conversion errors are local to one message and never change channel or
//! connection state. Transport errors are absorbed by the supervisor; only
//! channel operations surface them to callers.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while converting between a message value and a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    /// A field or sub-structure is missing or has the wrong shape.
    #[error("malformed {schema} document at `{path}`: {reason}")]
    MalformedDocument {
        schema: String,
        path: String,
        reason: String,
    },

    /// The value violates a domain rule of its schema.
    #[error("{schema} precondition violated: {reason}")]
    PreconditionViolated { schema: String, reason: String },

    /// The value cannot be represented in the wire format.
    #[error("failed to encode {schema}: {reason}")]
    EncodingFailure { schema: String, reason: String },

    /// The encoded document would exceed the maximum document size.
    #[error("{schema} document of {size} bytes exceeds the {limit} byte limit")]
    AllocationFailure {
        schema: String,
        size: usize,
        limit: usize,
    },

    /// The value handed to a converter belongs to another schema.
    #[error("converter for {expected} received a {found} value")]
    SchemaMismatch {
        expected: String,
        found: &'static str,
    },
}

/// Errors raised by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No converter is registered under this exact schema name.
    #[error("no converter registered for schema `{0}`")]
    NotFound(String),
}

/// Errors reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Handshake or health probe failed.
    #[error("bridge unavailable: {0}")]
    ConnectionUnavailable(String),

    /// The endpoint asks for a protocol this transport cannot speak.
    #[error("unsupported protocol `{0}`")]
    UnsupportedProtocol(String),

    /// A bounded network wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The operation needs a live link and there is none.
    #[error("transport is not connected")]
    NotConnected,

    /// The outgoing queue is full; the frame was not accepted.
    #[error("outgoing queue is full")]
    Backpressure,

    /// The peer sent something that is not a valid rosbridge frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::NotConnected => {
                TransportError::ConnectionUnavailable(err.to_string())
            }
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// Errors returned by channel operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// The channel name is empty.
    #[error("channel name must not be empty")]
    InvalidName,

    /// The schema name is empty.
    #[error("schema name must not be empty")]
    InvalidSchema,

    /// The schema has no converter in the registry.
    #[error(transparent)]
    UnknownSchema(#[from] RegistryError),

    /// The channel has no live connection.
    #[error("channel `{0}` is not connected")]
    NotConnected(String),

    /// The operation does not apply to this kind of channel.
    #[error("`{op}` is not supported on {kind} channel `{name}`")]
    Unsupported {
        op: &'static str,
        kind: &'static str,
        name: String,
    },

    /// Converting the value failed; nothing was sent.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The transport refused the operation.
    #[error(transparent)]
    Transport(TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_maps_to_unavailable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            TransportError::from(io),
            TransportError::ConnectionUnavailable(_)
        ));
    }

    #[test]
    fn other_io_errors_stay_io() {
        let io = std::io::Error::from(std::io::ErrorKind::InvalidData);
        assert!(matches!(TransportError::from(io), TransportError::Io(_)));
    }

    #[test]
    fn malformed_message_names_path() {
        let err = ConvertError::MalformedDocument {
            schema: "tf2_msgs/TFMessage".into(),
            path: "transforms[0].header".into(),
            reason: "missing field".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed tf2_msgs/TFMessage document at `transforms[0].header`: missing field"
        );
    }
}
