//! `std_msgs` layouts, plus the `Time` record shared by every stamped type.

use bson::{doc, Document};
use simbridge_types::{Header, StringMessage, Time};

use super::{u32_to_bson, FieldReader, RosMessage};
use crate::error::ConvertError;

pub(crate) fn time_doc(t: &Time) -> Document {
    doc! { "secs": u32_to_bson(t.secs), "nsecs": u32_to_bson(t.nsecs) }
}

pub(crate) fn read_time(reader: &FieldReader<'_>) -> Result<Time, ConvertError> {
    Ok(Time::new(reader.u32("secs")?, reader.u32("nsecs")?))
}

/// Write `header` as the `header` field of `doc`.
pub(crate) fn write_header(doc: &mut Document, header: &Header) {
    let mut inner = Document::new();
    header.write_fields(&mut inner);
    doc.insert("header", inner);
}

/// Read the `header` field of the document behind `reader`.
pub(crate) fn read_header(reader: &FieldReader<'_>) -> Result<Header, ConvertError> {
    Header::read_fields(&reader.child("header")?)
}

impl RosMessage for Header {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("seq", u32_to_bson(self.seq));
        doc.insert("stamp", time_doc(&self.stamp));
        doc.insert("frame_id", self.frame_id.as_str());
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(Header {
            seq: reader.u32("seq")?,
            stamp: read_time(&reader.child("stamp")?)?,
            frame_id: reader.string("frame_id")?,
        })
    }
}

impl RosMessage for StringMessage {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("data", self.data.as_str());
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(StringMessage {
            data: reader.string("data")?,
        })
    }
}
