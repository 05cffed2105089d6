//! The conversion contract between message values and BSON documents.
//!
//! Every schema gets one converter implementing [`MessageConverter`]. Most
//! converters are instances of [`Converter<M>`] for a type implementing
//! [`RosMessage`]; hand-written converters (e.g. test doubles) implement the
//! trait directly and are registered the same way.
//!
//! ## Contract
//!
//! - `encode` validates domain preconditions before building anything and
//!   never mutates its input. Field order is fixed per schema.
//! - `decode` copies everything it needs out of the document and returns a
//!   fresh value, or an error. A partially decoded value is never returned.
//! - For every well-formed value `decode(encode(v)) == v`.
//!
//! ## Example
//!
//! ```rust
//! use simbridge_sdk::convert::{Converter, MessageConverter};
//! use simbridge_types::{Message, TfMessage, TransformStamped};
//!
//! let converter = Converter::<TfMessage>::new();
//! let value = Message::from(TfMessage::new(vec![TransformStamped::new("world", "robot1")]));
//!
//! let document = converter.encode(&value).unwrap();
//! assert_eq!(converter.decode(&document).unwrap(), value);
//! ```

mod document;
mod geometry_msgs;
mod rosgraph_msgs;
mod std_msgs;
mod std_srvs;
mod tf2_msgs;

use std::fmt;
use std::marker::PhantomData;

use bson::Document;
use simbridge_types::{Message, MessageValue};

use crate::error::ConvertError;

pub use document::{encoded_size, u32_to_bson, FieldReader, MAX_DOCUMENT_SIZE};

/// The wire representation of one message instance.
pub type EncodedDocument = Document;

/// Bidirectional mapping between [`Message`] values of one schema and
/// encoded documents.
pub trait MessageConverter: Send + Sync {
    /// The schema this converter handles.
    fn schema(&self) -> &str;

    /// Build a fresh value from a document carrying this schema's shape.
    fn decode(&self, document: &EncodedDocument) -> Result<Message, ConvertError>;

    /// Build a new document from a value of this schema.
    fn encode(&self, value: &Message) -> Result<EncodedDocument, ConvertError>;
}

/// A message value with a fixed BSON layout.
pub trait RosMessage: MessageValue {
    /// Check domain rules that the wire format cannot express.
    fn validate(&self) -> Result<(), ConvertError> {
        Ok(())
    }

    /// Append this value's fields, in schema order, to an empty document.
    fn write_fields(&self, doc: &mut Document);

    /// Read a value from the fields of a document.
    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError>;
}

/// The [`MessageConverter`] for a [`RosMessage`] type.
pub struct Converter<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M: RosMessage> Converter<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Encode a typed value without going through [`Message`].
    pub fn encode_value(&self, value: &M) -> Result<EncodedDocument, ConvertError> {
        value.validate()?;

        let mut document = Document::new();
        value.write_fields(&mut document);
        encoded_size(M::SCHEMA, &document)?;
        Ok(document)
    }

    /// Decode a typed value without going through [`Message`].
    pub fn decode_value(&self, document: &EncodedDocument) -> Result<M, ConvertError> {
        M::read_fields(&FieldReader::new(M::SCHEMA, document))
    }
}

impl<M: RosMessage> Default for Converter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RosMessage> MessageConverter for Converter<M> {
    fn schema(&self) -> &str {
        M::SCHEMA
    }

    fn decode(&self, document: &EncodedDocument) -> Result<Message, ConvertError> {
        self.decode_value(document).map(Into::into)
    }

    fn encode(&self, value: &Message) -> Result<EncodedDocument, ConvertError> {
        let typed = M::from_message(value).ok_or_else(|| ConvertError::SchemaMismatch {
            expected: M::SCHEMA.to_string(),
            found: value.schema(),
        })?;
        self.encode_value(typed)
    }
}

impl<M: RosMessage> fmt::Debug for Converter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("schema", &M::SCHEMA)
            .finish()
    }
}

/// Encode a nested record into a standalone document.
pub(crate) fn record<M: RosMessage>(value: &M) -> Document {
    let mut doc = Document::new();
    value.write_fields(&mut doc);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_types::{Clock, StringMessage, Time};

    #[test]
    fn encode_rejects_other_schemas() {
        let converter = Converter::<Clock>::new();
        let err = converter
            .encode(&Message::from(StringMessage::new("x")))
            .unwrap_err();

        assert_eq!(
            err,
            ConvertError::SchemaMismatch {
                expected: "rosgraph_msgs/Clock".into(),
                found: "std_msgs/String",
            }
        );
    }

    #[test]
    fn encode_does_not_touch_input() {
        let converter = Converter::<Clock>::new();
        let value = Message::from(Clock::new(Time::new(5, 6)));
        let before = value.clone();
        converter.encode(&value).unwrap();
        assert_eq!(value, before);
    }

    #[test]
    fn schema_comes_from_type() {
        assert_eq!(Converter::<StringMessage>::new().schema(), "std_msgs/String");
    }
}
