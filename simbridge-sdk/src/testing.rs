//! In-memory transport used by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::TransportError;
use crate::transport::{
    DocumentCallback, Endpoint, ResponseCallback, ServiceHandler, Transport, TransportFactory,
};

/// One primitive seen by the fake, in call order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Connect(String),
    Advertise(String),
    Unadvertise(String),
    Subscribe(String),
    Unsubscribe(String),
    Publish(String, Document),
    AdvertiseService(String),
    UnadvertiseService(String),
    CallService(String, Document),
    Close,
}

/// Shared state behind every [`FakeTransport`] it hands out.
///
/// Stands in for "the bridge": tests flip reachability and health, make
/// individual topics fail, and deliver documents to subscribers.
pub(crate) struct FakeNetwork {
    calls: Mutex<Vec<Call>>,
    reachable: AtomicBool,
    healthy: AtomicBool,
    connect_attempts: AtomicUsize,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    failing: Mutex<BTreeSet<String>>,
    subscribers: Mutex<BTreeMap<String, DocumentCallback>>,
    services: Mutex<BTreeMap<String, ServiceHandler>>,
    responses: Mutex<Vec<(String, ResponseCallback)>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            healthy: AtomicBool::new(true),
            connect_attempts: AtomicUsize::new(0),
            connect_gate: Mutex::new(None),
            failing: Mutex::new(BTreeSet::new()),
            subscribers: Mutex::new(BTreeMap::new()),
            services: Mutex::new(BTreeMap::new()),
            responses: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn transport(self: &Arc<Self>) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            net: Arc::clone(self),
            connected: AtomicBool::new(false),
        })
    }

    pub(crate) fn factory(self: &Arc<Self>) -> Arc<dyn TransportFactory> {
        let net = Arc::clone(self);
        Arc::new(move || net.transport())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Make every handshake wait until the returned gate is notified.
    pub(crate) fn hold_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn release_connect(&self) {
        if let Some(gate) = self.connect_gate.lock().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    /// Make advertise/subscribe (and their service forms) fail for `name`.
    pub(crate) fn fail(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub(crate) fn heal(&self, name: &str) {
        self.failing.lock().remove(name);
    }

    /// Hand `document` to the subscriber of `topic`, if any.
    pub(crate) fn deliver(&self, topic: &str, document: Document) -> bool {
        let callback = self.subscribers.lock().get(topic).cloned();
        match callback {
            Some(callback) => {
                callback(document);
                true
            }
            None => false,
        }
    }

    /// Invoke the advertised handler for `service`.
    pub(crate) fn request(&self, service: &str, args: Document) -> Option<Document> {
        let handler = self.services.lock().get(service).cloned()?;
        handler(args)
    }

    /// Complete the oldest pending call to `service`.
    pub(crate) fn respond(&self, service: &str, response: Result<Document, TransportError>) -> bool {
        let pending = {
            let mut responses = self.responses.lock();
            let index = responses.iter().position(|(name, _)| name == service);
            index.map(|i| responses.remove(i))
        };
        match pending {
            Some((_, callback)) => {
                callback(response);
                true
            }
            None => false,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn check(&self, name: &str) -> Result<(), TransportError> {
        if self.failing.lock().contains(name) {
            Err(TransportError::Protocol(format!("bridge rejected `{name}`")))
        } else {
            Ok(())
        }
    }
}

pub(crate) struct FakeTransport {
    net: Arc<FakeNetwork>,
    connected: AtomicBool,
}

impl FakeTransport {
    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.net.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.net.record(Call::Connect(endpoint.to_string()));
        let gate = self.net.connect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if !self.net.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionUnavailable(endpoint.to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.net.healthy.load(Ordering::SeqCst)
    }

    fn advertise(&self, topic: &str, _schema: &str, _queue_size: u32) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::Advertise(topic.to_string()));
        self.net.check(topic)
    }

    fn unadvertise(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::Unadvertise(topic.to_string()));
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        _schema: &str,
        _queue_length: u32,
        callback: DocumentCallback,
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::Subscribe(topic.to_string()));
        self.net.check(topic)?;
        self.net.subscribers.lock().insert(topic.to_string(), callback);
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::Unsubscribe(topic.to_string()));
        self.net.subscribers.lock().remove(topic);
        Ok(())
    }

    fn publish(&self, topic: &str, document: Document) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::Publish(topic.to_string(), document));
        Ok(())
    }

    fn advertise_service(
        &self,
        service: &str,
        _service_type: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::AdvertiseService(service.to_string()));
        self.net.check(service)?;
        self.net.services.lock().insert(service.to_string(), handler);
        Ok(())
    }

    fn unadvertise_service(&self, service: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::UnadvertiseService(service.to_string()));
        self.net.services.lock().remove(service);
        Ok(())
    }

    fn call_service(
        &self,
        service: &str,
        args: Document,
        callback: ResponseCallback,
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.net.record(Call::CallService(service.to_string(), args));
        self.net.responses.lock().push((service.to_string(), callback));
        Ok(())
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.net.record(Call::Close);
        }
    }
}
