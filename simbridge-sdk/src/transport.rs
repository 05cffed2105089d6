//! The network collaborator consumed by [`ConnectionCore`](crate::ConnectionCore).
//!
//! The SDK never touches sockets. A transport speaks the bridge protocol
//! over some link and exposes the primitives below; `simbridge-transport`
//! provides TCP and WebSocket implementations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;

use crate::error::TransportError;

/// Called with the `msg` body of every document published on a subscribed topic.
pub type DocumentCallback = Arc<dyn Fn(Document) + Send + Sync>;

/// Answers an incoming service request with a response document.
///
/// Returning `None` reports the call as failed to the caller.
pub type ServiceHandler = Arc<dyn Fn(Document) -> Option<Document> + Send + Sync>;

/// Receives the outcome of an outgoing service call exactly once.
pub type ResponseCallback = Box<dyn FnOnce(Result<Document, TransportError>) + Send>;

/// Where the bridge listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// `"tcp"` or `"ws"`.
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// `tcp://127.0.0.1:9090`
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new("tcp", host, port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::tcp("127.0.0.1", 9090)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// One link to the bridge.
///
/// A transport instance is used for a single connection: it is created,
/// connected once, used, and closed. Reconnecting means creating a new
/// instance through a [`TransportFactory`].
///
/// Everything except `connect` and `is_healthy` must return promptly:
/// outgoing frames are queued, never awaited.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake. Called at most once per instance.
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Lightweight liveness probe.
    async fn is_healthy(&self) -> bool;

    fn advertise(&self, topic: &str, schema: &str, queue_size: u32)
        -> Result<(), TransportError>;

    fn unadvertise(&self, topic: &str) -> Result<(), TransportError>;

    fn subscribe(
        &self,
        topic: &str,
        schema: &str,
        queue_length: u32,
        callback: DocumentCallback,
    ) -> Result<(), TransportError>;

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, document: Document) -> Result<(), TransportError>;

    fn advertise_service(
        &self,
        service: &str,
        service_type: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError>;

    fn unadvertise_service(&self, service: &str) -> Result<(), TransportError>;

    fn call_service(
        &self,
        service: &str,
        args: Document,
        callback: ResponseCallback,
    ) -> Result<(), TransportError>;

    /// Drop the link. No callback may fire once this returns.
    fn close(&self);
}

/// Creates a fresh, unconnected [`Transport`] for each connection attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Box<dyn Transport> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::default().to_string(), "tcp://127.0.0.1:9090");
        assert_eq!(
            Endpoint::new("ws", "bridge.local", 9091).to_string(),
            "ws://bridge.local:9091"
        );
    }
}
