//! rosbridge v2 operation envelopes.
//!
//! Outgoing frames are built with the functions below; incoming frames are
//! classified by [`Incoming::parse`]. Message bodies travel in `msg`,
//! `args` and `values` untouched.

use bson::{doc, Bson, Document};

use crate::error::ProtocolError;

pub fn advertise(id: &str, topic: &str, schema: &str, queue_size: u32) -> Document {
    doc! {
        "op": "advertise",
        "id": id,
        "topic": topic,
        "type": schema,
        "queue_size": clamp(queue_size),
    }
}

pub fn unadvertise(id: &str, topic: &str) -> Document {
    doc! { "op": "unadvertise", "id": id, "topic": topic }
}

pub fn publish(id: &str, topic: &str, msg: Document) -> Document {
    doc! { "op": "publish", "id": id, "topic": topic, "msg": msg }
}

pub fn subscribe(id: &str, topic: &str, schema: &str, queue_length: u32) -> Document {
    doc! {
        "op": "subscribe",
        "id": id,
        "topic": topic,
        "type": schema,
        "queue_length": clamp(queue_length),
    }
}

pub fn unsubscribe(id: &str, topic: &str) -> Document {
    doc! { "op": "unsubscribe", "id": id, "topic": topic }
}

pub fn advertise_service(service: &str, service_type: &str) -> Document {
    doc! { "op": "advertise_service", "type": service_type, "service": service }
}

pub fn unadvertise_service(service: &str) -> Document {
    doc! { "op": "unadvertise_service", "service": service }
}

pub fn call_service(id: &str, service: &str, args: Document) -> Document {
    doc! { "op": "call_service", "id": id, "service": service, "args": args }
}

/// Reply to an incoming `call_service`. A failed call carries no values.
pub fn service_response(id: Option<&str>, service: &str, values: Option<Document>) -> Document {
    let mut frame = doc! { "op": "service_response", "service": service };
    if let Some(id) = id {
        frame.insert("id", id);
    }
    match values {
        Some(values) => {
            frame.insert("values", values);
            frame.insert("result", true);
        }
        None => {
            frame.insert("result", false);
        }
    }
    frame
}

fn clamp(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A frame received from the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Publish {
        topic: String,
        msg: Document,
    },
    /// The bridge asks us to serve a request.
    CallService {
        id: Option<String>,
        service: String,
        args: Document,
    },
    /// The answer to a call we made.
    ServiceResponse {
        id: Option<String>,
        service: String,
        values: Option<Bson>,
        result: bool,
    },
    Status {
        level: String,
        msg: String,
    },
    /// Any other operation; ignored.
    Other(String),
}

impl Incoming {
    pub fn parse(mut frame: Document) -> Result<Self, ProtocolError> {
        let op = frame
            .get_str("op")
            .map_err(|_| ProtocolError::MissingOp)?
            .to_string();

        let incoming = match op.as_str() {
            "publish" => Incoming::Publish {
                topic: required_str(&frame, &op, "topic")?,
                msg: match frame.remove("msg") {
                    Some(Bson::Document(msg)) => msg,
                    _ => return Err(missing(&op, "msg")),
                },
            },
            "call_service" => Incoming::CallService {
                id: optional_str(&frame, "id"),
                service: required_str(&frame, &op, "service")?,
                args: match frame.remove("args") {
                    Some(Bson::Document(args)) => args,
                    None | Some(Bson::Null) => Document::new(),
                    Some(_) => return Err(missing(&op, "args")),
                },
            },
            "service_response" => Incoming::ServiceResponse {
                id: optional_str(&frame, "id"),
                service: required_str(&frame, &op, "service")?,
                result: frame.get_bool("result").unwrap_or(true),
                values: frame.remove("values"),
            },
            "status" => Incoming::Status {
                level: optional_str(&frame, "level").unwrap_or_default(),
                msg: optional_str(&frame, "msg").unwrap_or_default(),
            },
            _ => Incoming::Other(op),
        };
        Ok(incoming)
    }
}

fn missing(op: &str, field: &'static str) -> ProtocolError {
    ProtocolError::MissingField {
        op: op.to_string(),
        field,
    }
}

fn required_str(frame: &Document, op: &str, field: &'static str) -> Result<String, ProtocolError> {
    frame
        .get_str(field)
        .map(str::to_string)
        .map_err(|_| missing(op, field))
}

fn optional_str(frame: &Document, field: &str) -> Option<String> {
    frame.get_str(field).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertise_envelope() {
        assert_eq!(
            advertise("advertise:/tf:1", "/tf", "tf2_msgs/TFMessage", 10),
            doc! {
                "op": "advertise",
                "id": "advertise:/tf:1",
                "topic": "/tf",
                "type": "tf2_msgs/TFMessage",
                "queue_size": 10,
            }
        );
    }

    #[test]
    fn publish_wraps_body_in_msg() {
        let frame = publish("publish:/chatter:2", "/chatter", doc! { "data": "hi" });
        assert_eq!(frame.get_document("msg").unwrap(), &doc! { "data": "hi" });
        assert_eq!(frame.get_str("op").unwrap(), "publish");
    }

    #[test]
    fn oversized_queue_is_clamped() {
        let frame = subscribe("s", "/t", "std_msgs/String", u32::MAX);
        assert_eq!(frame.get_i32("queue_length").unwrap(), i32::MAX);
    }

    #[test]
    fn failed_service_response_has_no_values() {
        let frame = service_response(Some("7"), "/enable", None);
        assert!(!frame.get_bool("result").unwrap());
        assert!(!frame.contains_key("values"));
    }

    #[test]
    fn parses_publish() {
        let frame = doc! { "op": "publish", "topic": "/chatter", "msg": { "data": "x" } };
        assert_eq!(
            Incoming::parse(frame).unwrap(),
            Incoming::Publish {
                topic: "/chatter".into(),
                msg: doc! { "data": "x" },
            }
        );
    }

    #[test]
    fn publish_without_msg_is_rejected() {
        let frame = doc! { "op": "publish", "topic": "/chatter" };
        assert_eq!(
            Incoming::parse(frame).unwrap_err(),
            ProtocolError::MissingField {
                op: "publish".into(),
                field: "msg"
            }
        );
    }

    #[test]
    fn call_service_without_args_gets_empty_args() {
        let frame = doc! { "op": "call_service", "id": "1", "service": "/trigger" };
        assert_eq!(
            Incoming::parse(frame).unwrap(),
            Incoming::CallService {
                id: Some("1".into()),
                service: "/trigger".into(),
                args: Document::new(),
            }
        );
    }

    #[test]
    fn service_response_defaults_to_success() {
        let frame = doc! { "op": "service_response", "service": "/s", "values": {} };
        match Incoming::parse(frame).unwrap() {
            Incoming::ServiceResponse { result, values, .. } => {
                assert!(result);
                assert_eq!(values, Some(Bson::Document(Document::new())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_ops_are_passed_through() {
        let frame = doc! { "op": "png", "data": "..." };
        assert_eq!(Incoming::parse(frame).unwrap(), Incoming::Other("png".into()));
        assert_eq!(
            Incoming::parse(doc! { "topic": "/x" }).unwrap_err(),
            ProtocolError::MissingOp
        );
    }
}
