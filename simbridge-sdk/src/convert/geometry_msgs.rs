//! `geometry_msgs` layouts.

use bson::{doc, Document};
use simbridge_types::{Quaternion, Transform, TransformStamped, Vector3};

use super::std_msgs::{read_header, write_header};
use super::{FieldReader, RosMessage};
use crate::error::ConvertError;

pub(crate) fn vector3_doc(v: &Vector3) -> Document {
    doc! { "x": v.x, "y": v.y, "z": v.z }
}

pub(crate) fn read_vector3(reader: &FieldReader<'_>) -> Result<Vector3, ConvertError> {
    Ok(Vector3::new(reader.f64("x")?, reader.f64("y")?, reader.f64("z")?))
}

pub(crate) fn quaternion_doc(q: &Quaternion) -> Document {
    doc! { "x": q.x, "y": q.y, "z": q.z, "w": q.w }
}

pub(crate) fn read_quaternion(reader: &FieldReader<'_>) -> Result<Quaternion, ConvertError> {
    Ok(Quaternion::new(
        reader.f64("x")?,
        reader.f64("y")?,
        reader.f64("z")?,
        reader.f64("w")?,
    ))
}

pub(crate) fn transform_doc(t: &Transform) -> Document {
    doc! {
        "translation": vector3_doc(&t.translation),
        "rotation": quaternion_doc(&t.rotation),
    }
}

pub(crate) fn read_transform(reader: &FieldReader<'_>) -> Result<Transform, ConvertError> {
    Ok(Transform::new(
        read_vector3(&reader.child("translation")?)?,
        read_quaternion(&reader.child("rotation")?)?,
    ))
}

impl RosMessage for TransformStamped {
    fn write_fields(&self, doc: &mut Document) {
        write_header(doc, &self.header);
        doc.insert("child_frame_id", self.child_frame_id.as_str());
        doc.insert("transform", transform_doc(&self.transform));
    }

    fn read_fields(reader: &FieldReader<'_>) -> Result<Self, ConvertError> {
        Ok(TransformStamped {
            header: read_header(reader)?,
            child_frame_id: reader.string("child_frame_id")?,
            transform: read_transform(&reader.child("transform")?)?,
        })
    }
}
