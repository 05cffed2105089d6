//! Routing of incoming frames to subscriber callbacks, service handlers
//! and pending calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bson::{Bson, Document};
use parking_lot::{Mutex, RwLock};
use simbridge_sdk::{DocumentCallback, ResponseCallback, ServiceHandler, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::protocol::{self, Incoming};

#[derive(Default)]
pub(crate) struct Dispatcher {
    disabled: AtomicBool,
    topics: RwLock<HashMap<String, DocumentCallback>>,
    services: RwLock<HashMap<String, ServiceHandler>>,
    pending: Mutex<HashMap<String, ResponseCallback>>,
}

impl Dispatcher {
    pub(crate) fn add_topic(&self, topic: &str, callback: DocumentCallback) {
        self.topics.write().insert(topic.to_string(), callback);
    }

    pub(crate) fn remove_topic(&self, topic: &str) {
        self.topics.write().remove(topic);
    }

    pub(crate) fn add_service(&self, service: &str, handler: ServiceHandler) {
        self.services.write().insert(service.to_string(), handler);
    }

    pub(crate) fn remove_service(&self, service: &str) {
        self.services.write().remove(service);
    }

    pub(crate) fn add_pending(&self, id: String, callback: ResponseCallback) {
        self.pending.lock().insert(id, callback);
    }

    pub(crate) fn take_pending(&self, id: &str) -> Option<ResponseCallback> {
        self.pending.lock().remove(id)
    }

    /// Stop routing and drop every registration. Pending calls are
    /// dropped without being answered.
    pub(crate) fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
        self.topics.write().clear();
        self.services.write().clear();
        self.pending.lock().clear();
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Route one frame. Replies to service requests go to `replies`.
    pub(crate) fn dispatch(&self, frame: Document, replies: &mpsc::WeakSender<Document>) {
        if self.is_disabled() {
            return;
        }

        let incoming = match Incoming::parse(frame) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed frame");
                return;
            }
        };

        match incoming {
            Incoming::Publish { topic, msg } => {
                let callback = self.topics.read().get(&topic).cloned();
                match callback {
                    Some(callback) => callback(msg),
                    None => trace!(topic = %topic, "No subscriber for message"),
                }
            }
            Incoming::CallService { id, service, args } => {
                let handler = self.services.read().get(&service).cloned();
                let values = match handler {
                    Some(handler) => handler(args),
                    None => {
                        warn!(service = %service, "Request for a service we do not serve");
                        None
                    }
                };
                let reply = protocol::service_response(id.as_deref(), &service, values);
                let sent = replies.upgrade().map(|tx| tx.try_send(reply).is_ok());
                if sent != Some(true) {
                    warn!(service = %service, "Dropping service response, queue unavailable");
                }
            }
            Incoming::ServiceResponse {
                id,
                service,
                values,
                result,
            } => match id.and_then(|id| self.take_pending(&id)) {
                Some(callback) => callback(response(&service, result, values)),
                None => debug!(service = %service, "Response for an unknown call"),
            },
            Incoming::Status { level, msg } => match level.as_str() {
                "error" | "warning" => warn!(level = %level, "Bridge status: {msg}"),
                _ => debug!(level = %level, "Bridge status: {msg}"),
            },
            Incoming::Other(op) => trace!(op = %op, "Ignoring operation"),
        }
    }
}

fn response(service: &str, result: bool, values: Option<Bson>) -> Result<Document, TransportError> {
    match (result, values) {
        (true, Some(Bson::Document(values))) => Ok(values),
        (true, None | Some(Bson::Null)) => Ok(Document::new()),
        (true, Some(other)) => Err(TransportError::Protocol(format!(
            "`{service}` returned non-document values: {other}"
        ))),
        (false, Some(Bson::String(reason))) => Err(TransportError::Protocol(format!(
            "`{service}` failed: {reason}"
        ))),
        (false, _) => Err(TransportError::Protocol(format!("`{service}` failed"))),
    }
}
