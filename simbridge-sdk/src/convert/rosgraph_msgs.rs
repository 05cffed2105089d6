//! `rosgraph_msgs/Clock`.

use bson::Document;
use simbridge_types::Clock;

use super::std_msgs::{read_time, time_doc};
use super::{FieldReader, RosMessage};
use crate::error::ConvertError;

impl RosMessage for Clock {
    fn write_fields(&self, doc: &mut Document) {
        doc.insert("clock", time_doc(&self.clock));
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(Clock::new(read_time(&reader.child("clock")?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use bson::doc;
    use simbridge_types::Time;

    #[test]
    fn clock_layout() {
        let doc = Converter::<Clock>::new()
            .encode_value(&Clock::new(Time::new(1_700_000_000, 500)))
            .unwrap();
        assert_eq!(doc, doc! { "clock": { "secs": 1_700_000_000, "nsecs": 500 } });
    }

    #[test]
    fn clock_from_int64_fields() {
        let doc = doc! { "clock": { "secs": 12_i64, "nsecs": 34_i64 } };
        let clock = Converter::<Clock>::new().decode_value(&doc).unwrap();
        assert_eq!(clock, Clock::new(Time::new(12, 34)));
    }

    #[test]
    fn clock_missing_nsecs() {
        let doc = doc! { "clock": { "secs": 12 } };
        let err = Converter::<Clock>::new().decode_value(&doc).unwrap_err();
        assert!(err.to_string().contains("clock.nsecs"));
    }
}
