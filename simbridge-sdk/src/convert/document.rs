//! Defensive field access on BSON documents.
//!
//! Every accessor reports the full path of the offending field so a
//! malformed message from a remote peer can be traced without dumping it.

use bson::{Bson, Document};

use crate::error::ConvertError;

/// Maximum size of a single BSON document.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Read-only view of one (sub-)document of a message being decoded.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    schema: &'a str,
    path: String,
    doc: &'a Document,
}

impl<'a> FieldReader<'a> {
    /// A reader over the root document of `schema`.
    pub fn new(schema: &'a str, doc: &'a Document) -> Self {
        Self {
            schema,
            path: String::new(),
            doc,
        }
    }

    /// The document this reader looks at.
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn malformed(&self, path: String, reason: impl Into<String>) -> ConvertError {
        ConvertError::MalformedDocument {
            schema: self.schema.to_string(),
            path,
            reason: reason.into(),
        }
    }

    fn get(&self, key: &str) -> Result<&'a Bson, ConvertError> {
        self.doc
            .get(key)
            .ok_or_else(|| self.malformed(self.field_path(key), "missing field"))
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Bson) -> ConvertError {
        self.malformed(
            self.field_path(key),
            format!("expected {expected}, found {:?}", found.element_type()),
        )
    }

    /// Descend into a nested record.
    pub fn child(&self, key: &str) -> Result<FieldReader<'a>, ConvertError> {
        match self.get(key)? {
            Bson::Document(doc) => Ok(FieldReader {
                schema: self.schema,
                path: self.field_path(key),
                doc,
            }),
            other => Err(self.wrong_type(key, "document", other)),
        }
    }

    /// Readers over every element of an array of records, in document order.
    pub fn records(&self, key: &str) -> Result<Vec<FieldReader<'a>>, ConvertError> {
        let items = match self.get(key)? {
            Bson::Array(items) => items,
            other => return Err(self.wrong_type(key, "array", other)),
        };

        let base = self.field_path(key);
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let path = format!("{base}[{index}]");
                match item {
                    Bson::Document(doc) => Ok(FieldReader {
                        schema: self.schema,
                        path,
                        doc,
                    }),
                    other => Err(self.malformed(
                        path,
                        format!("expected document, found {:?}", other.element_type()),
                    )),
                }
            })
            .collect()
    }

    /// A floating point field. Integer encodings are accepted since some
    /// peers write whole numbers as integers.
    pub fn f64(&self, key: &str) -> Result<f64, ConvertError> {
        match self.get(key)? {
            Bson::Double(v) => Ok(*v),
            Bson::Int32(v) => Ok(f64::from(*v)),
            Bson::Int64(v) => Ok(*v as f64),
            other => Err(self.wrong_type(key, "double", other)),
        }
    }

    /// An unsigned 32-bit field, stored as int32 or int64 on the wire.
    pub fn u32(&self, key: &str) -> Result<u32, ConvertError> {
        let value = match self.get(key)? {
            Bson::Int32(v) => i64::from(*v),
            Bson::Int64(v) => *v,
            other => return Err(self.wrong_type(key, "integer", other)),
        };
        u32::try_from(value)
            .map_err(|_| self.malformed(self.field_path(key), format!("{value} out of range for uint32")))
    }

    pub fn bool(&self, key: &str) -> Result<bool, ConvertError> {
        match self.get(key)? {
            Bson::Boolean(v) => Ok(*v),
            other => Err(self.wrong_type(key, "bool", other)),
        }
    }

    pub fn string(&self, key: &str) -> Result<String, ConvertError> {
        match self.get(key)? {
            Bson::String(v) => Ok(v.clone()),
            other => Err(self.wrong_type(key, "string", other)),
        }
    }
}

/// Wire representation of an unsigned 32-bit value: int32 when it fits,
/// int64 otherwise.
pub fn u32_to_bson(value: u32) -> Bson {
    match i32::try_from(value) {
        Ok(v) => Bson::Int32(v),
        Err(_) => Bson::Int64(i64::from(value)),
    }
}

/// Serialized size of a document, checked against [`MAX_DOCUMENT_SIZE`].
pub fn encoded_size(schema: &str, doc: &Document) -> Result<usize, ConvertError> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf)
        .map_err(|e| ConvertError::EncodingFailure {
            schema: schema.to_string(),
            reason: e.to_string(),
        })?;

    if buf.len() > MAX_DOCUMENT_SIZE {
        return Err(ConvertError::AllocationFailure {
            schema: schema.to_string(),
            size: buf.len(),
            limit: MAX_DOCUMENT_SIZE,
        });
    }
    Ok(buf.len())
}
