//! `std_srvs` request and response layouts.

use bson::Document;
use simbridge_types::{SetBoolRequest, SetBoolResponse, TriggerRequest, TriggerResponse};

use super::{FieldReader, RosMessage};
use crate::error::ConvertError;

impl RosMessage for SetBoolRequest {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("data", self.data);
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(SetBoolRequest {
            data: reader.bool("data")?,
        })
    }
}

impl RosMessage for SetBoolResponse {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("success", self.success);
        doc.insert("message", self.message.as_str());
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(SetBoolResponse {
            success: reader.bool("success")?,
            message: reader.string("message")?,
        })
    }
}

impl RosMessage for TriggerRequest {
    fn write_fields(&self, _doc: &mut Document) {}

    fn read_fields(_reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(TriggerRequest)
    }
}

impl RosMessage for TriggerResponse {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("success", self.success);
        doc.insert("message", self.message.as_str());
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(TriggerResponse {
            success: reader.bool("success")?,
            message: reader.string("message")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use bson::doc;

    #[test]
    fn trigger_request_is_empty() {
        let doc = Converter::<TriggerRequest>::new()
            .encode_value(&TriggerRequest)
            .unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn set_bool_response_round_trip() {
        let converter = Converter::<SetBoolResponse>::new();
        let value = SetBoolResponse {
            success: true,
            message: "motors enabled".into(),
        };
        let doc = converter.encode_value(&value).unwrap();
        assert_eq!(doc, doc! { "success": true, "message": "motors enabled" });
        assert_eq!(converter.decode_value(&doc).unwrap(), value);
    }

    #[test]
    fn set_bool_request_rejects_integer_flag() {
        let err = Converter::<SetBoolRequest>::new()
            .decode_value(&doc! { "data": 1 })
            .unwrap_err();
        assert!(err.to_string().contains("expected bool"));
    }
}
