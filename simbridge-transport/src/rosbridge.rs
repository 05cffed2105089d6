//! [`Transport`] implementation speaking the rosbridge protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;
use simbridge_sdk::{
    DocumentCallback, Endpoint, ResponseCallback, ServiceHandler, Transport, TransportError,
    TransportFactory,
};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::link::{Link, LinkTasks};
use crate::protocol;

/// Default capacity of the outgoing frame queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Settings shared by every transport a [`RosbridgeFactory`] creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Frames queued for the writer before sends fail with `Backpressure`.
    pub queue_capacity: usize,
    /// Service called by the health probe, e.g. `/rosapi/get_time`.
    /// Without one the probe only checks that the link tasks are alive.
    pub probe_service: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            probe_service: None,
        }
    }
}

/// One rosbridge connection over TCP or WebSocket.
///
/// The protocol is picked from [`Endpoint::protocol`]: `tcp`, or `ws`
/// when built with the `websocket` feature.
pub struct RosbridgeTransport {
    config: TransportConfig,
    dispatcher: Arc<Dispatcher>,
    outgoing: Mutex<Option<mpsc::Sender<Document>>>,
    tasks: Mutex<Option<LinkTasks>>,
    next_id: AtomicU64,
}

impl RosbridgeTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::default()),
            outgoing: Mutex::new(None),
            tasks: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn id(&self, op: &str, name: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{op}:{name}:{n}")
    }

    fn send(&self, frame: Document) -> Result<(), TransportError> {
        let outgoing = self.outgoing.lock();
        let Some(tx) = outgoing.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::NotConnected,
        })
    }

    fn link_alive(&self) -> bool {
        let open = self
            .outgoing
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed());
        open && self.tasks.lock().as_ref().is_some_and(LinkTasks::is_alive)
    }

    async fn probe(&self, service: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        let result = self.call_service(
            service,
            Document::new(),
            Box::new(move |response| {
                let _ = tx.send(response.is_ok());
            }),
        );
        if result.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

#[async_trait]
impl Transport for RosbridgeTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if self.dispatcher.is_disabled() {
            return Err(TransportError::NotConnected);
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let link = Link {
            outgoing: rx,
            replies: tx.downgrade(),
            dispatcher: Arc::clone(&self.dispatcher),
        };

        let tasks = match endpoint.protocol.as_str() {
            #[cfg(feature = "tcp")]
            "tcp" => crate::tcp::open(endpoint, link).await?,
            #[cfg(feature = "websocket")]
            "ws" | "websocket" => crate::websocket::open(endpoint, link).await?,
            other => return Err(TransportError::UnsupportedProtocol(other.to_string())),
        };

        *self.tasks.lock() = Some(tasks);
        *self.outgoing.lock() = Some(tx);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        if !self.link_alive() {
            return false;
        }
        match &self.config.probe_service {
            Some(service) => self.probe(service).await,
            None => true,
        }
    }

    fn advertise(&self, topic: &str, schema: &str, queue_size: u32) -> Result<(), TransportError> {
        let id = self.id("advertise", topic);
        self.send(protocol::advertise(&id, topic, schema, queue_size))
    }

    fn unadvertise(&self, topic: &str) -> Result<(), TransportError> {
        let id = self.id("unadvertise", topic);
        self.send(protocol::unadvertise(&id, topic))
    }

    fn subscribe(
        &self,
        topic: &str,
        schema: &str,
        queue_length: u32,
        callback: DocumentCallback,
    ) -> Result<(), TransportError> {
        self.dispatcher.add_topic(topic, callback);
        let id = self.id("subscribe", topic);
        let sent = self.send(protocol::subscribe(&id, topic, schema, queue_length));
        if sent.is_err() {
            self.dispatcher.remove_topic(topic);
        }
        sent
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.dispatcher.remove_topic(topic);
        let id = self.id("unsubscribe", topic);
        self.send(protocol::unsubscribe(&id, topic))
    }

    fn publish(&self, topic: &str, document: Document) -> Result<(), TransportError> {
        let id = self.id("publish", topic);
        self.send(protocol::publish(&id, topic, document))
    }

    fn advertise_service(
        &self,
        service: &str,
        service_type: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError> {
        self.dispatcher.add_service(service, handler);
        let sent = self.send(protocol::advertise_service(service, service_type));
        if sent.is_err() {
            self.dispatcher.remove_service(service);
        }
        sent
    }

    fn unadvertise_service(&self, service: &str) -> Result<(), TransportError> {
        self.dispatcher.remove_service(service);
        self.send(protocol::unadvertise_service(service))
    }

    fn call_service(
        &self,
        service: &str,
        args: Document,
        callback: ResponseCallback,
    ) -> Result<(), TransportError> {
        let id = self.id("call_service", service);
        self.dispatcher.add_pending(id.clone(), callback);
        let sent = self.send(protocol::call_service(&id, service, args));
        if sent.is_err() {
            self.dispatcher.take_pending(&id);
        }
        sent
    }

    fn close(&self) {
        self.dispatcher.disable();
        self.outgoing.lock().take();
        if let Some(tasks) = self.tasks.lock().take() {
            tasks.shutdown();
        }
        debug!("rosbridge transport closed");
    }
}

impl Drop for RosbridgeTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates a [`RosbridgeTransport`] per connection attempt.
#[derive(Debug, Clone, Default)]
pub struct RosbridgeFactory {
    config: TransportConfig,
}

impl RosbridgeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl TransportFactory for RosbridgeFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(RosbridgeTransport::new(self.config.clone()))
    }
}
