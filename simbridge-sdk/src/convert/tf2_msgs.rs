//! `tf2_msgs/TFMessage`.

use bson::{Bson, Document};
use simbridge_types::{TfMessage, TransformStamped};
use tracing::warn;

use super::{record, FieldReader, RosMessage};
use crate::error::ConvertError;

impl RosMessage for TfMessage {
    fn validate(&self) -> Result<(), ConvertError> {
        if self.transforms.is_empty() {
            warn!("No transform saved in TFMessage, refusing to convert");
            return Err(ConvertError::PreconditionViolated {
                schema: simbridge_types::schema::TF_MESSAGE.to_string(),
                reason: "at least one transform is required".to_string(),
            });
        }
        Ok(())
    }

    fn write_fields(&self, doc: &mut Document) {
        let transforms: Vec<Bson> = self
            .transforms
            .iter()
            .map(|t| Bson::Document(record(t)))
            .collect();
        doc.insert("transforms", transforms);
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        let transforms = reader
            .records("transforms")?
            .iter()
            .map(TransformStamped::read_fields)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TfMessage { transforms })
    }
}
