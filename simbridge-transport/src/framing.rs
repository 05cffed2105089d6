//! BSON-only framing for stream transports.
//!
//! A BSON document starts with its own little-endian `i32` length, so a
//! stream of documents needs no extra prefix: read four bytes, then the
//! remainder.

use bson::Document;
use simbridge_sdk::convert::MAX_DOCUMENT_SIZE;
use simbridge_sdk::TransportError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// The smallest valid document: length prefix plus terminating NUL.
const MIN_DOCUMENT_SIZE: usize = 5;

/// Read one document. Returns `Ok(None)` on a clean end of stream.
///
/// The end is clean only between documents; a stream that stops inside a
/// length prefix is a protocol error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Document>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(ProtocolError::TruncatedLength(filled).into()),
            n => filled += n,
        }
    }

    let declared = i32::from_le_bytes(prefix);
    let length = usize::try_from(declared)
        .ok()
        .filter(|len| (MIN_DOCUMENT_SIZE..=MAX_DOCUMENT_SIZE).contains(len))
        .ok_or(ProtocolError::BadLength(i64::from(declared)))?;

    let mut buf = vec![0u8; length];
    buf[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut buf[4..]).await?;

    Document::from_reader(buf.as_slice())
        .map(Some)
        .map_err(|e| ProtocolError::InvalidDocument(e.to_string()).into())
}

/// Serialize `document` into a standalone frame.
pub fn encode_frame(document: &Document) -> Result<Vec<u8>, TransportError> {
    let mut buf = Vec::new();
    document
        .to_writer(&mut buf)
        .map_err(|e| TransportError::Protocol(e.to_string()))?;
    Ok(buf)
}

/// Write one document and flush.
pub async fn write_frame<W>(writer: &mut W, document: &Document) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_frame(document)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
