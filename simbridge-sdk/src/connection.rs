//! A single live link to the bridge.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bson::Document;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{
    DocumentCallback, Endpoint, ResponseCallback, ServiceHandler, Transport,
};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Bounds on the two operations that wait on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long the handshake may take.
    pub connect: Duration,
    /// How long a health probe may take before it counts as failed.
    pub probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(2000),
            probe: Duration::from_millis(1000),
        }
    }
}

/// Owns one [`Transport`] for its whole lifetime.
///
/// A core is created, initialized once, and torn down; it is never
/// reconnected in place. The supervisor replaces it with a fresh core
/// instead. Channels hold it only through `Weak` references.
///
/// Every callback handed to the transport goes through a gate that is
/// closed by [`teardown`](Self::teardown), so nothing registered through
/// this core can fire after it is gone.
pub struct ConnectionCore {
    id: u64,
    endpoint: Endpoint,
    timeouts: Timeouts,
    transport: Box<dyn Transport>,
    live: AtomicBool,
    gate: Arc<AtomicBool>,
    last_health_check: Mutex<Option<Instant>>,
}

impl ConnectionCore {
    pub fn new(endpoint: Endpoint, transport: Box<dyn Transport>, timeouts: Timeouts) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            endpoint,
            timeouts,
            transport,
            live: AtomicBool::new(false),
            gate: Arc::new(AtomicBool::new(true)),
            last_health_check: Mutex::new(None),
        }
    }

    /// Process-unique id, used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Perform the handshake, bounded by the connect timeout.
    ///
    /// Returns whether the link is up. A failed handshake is not retried
    /// here; the supervisor decides when to build the next core.
    pub async fn init(&self) -> bool {
        if self.is_torn_down() {
            return false;
        }
        if self.is_live() {
            return true;
        }

        let result = tokio::time::timeout(
            self.timeouts.connect,
            self.transport.connect(&self.endpoint),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout(self.timeouts.connect)));

        match result {
            Ok(()) if !self.is_torn_down() => {
                self.live.store(true, Ordering::Release);
                *self.last_health_check.lock() = Some(Instant::now());
                info!(connection = self.id, endpoint = %self.endpoint, "Connected to bridge");
                true
            }
            Ok(()) => false,
            Err(e) => {
                warn!(
                    connection = self.id,
                    endpoint = %self.endpoint,
                    error = %e,
                    "Could not connect to bridge"
                );
                false
            }
        }
    }

    /// Whether the handshake completed and the core has not been torn down.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_torn_down(&self) -> bool {
        !self.gate.load(Ordering::Acquire)
    }

    /// Probe the link, bounded by the probe timeout. A failed probe marks
    /// the core as no longer live.
    pub async fn is_healthy(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        let healthy = tokio::time::timeout(self.timeouts.probe, self.transport.is_healthy())
            .await
            .unwrap_or(false);
        *self.last_health_check.lock() = Some(Instant::now());
        if !healthy {
            self.live.store(false, Ordering::Release);
            debug!(connection = self.id, "Health probe failed");
        }
        healthy
    }

    /// When the last probe (or the handshake) completed.
    pub fn last_health_check(&self) -> Option<Instant> {
        *self.last_health_check.lock()
    }

    /// Close the transport and silence every callback registered through
    /// this core. Idempotent.
    pub fn teardown(&self) {
        if self.gate.swap(false, Ordering::AcqRel) {
            self.live.store(false, Ordering::Release);
            self.transport.close();
            debug!(connection = self.id, "Connection torn down");
        }
    }

    fn ensure_live(&self) -> Result<(), TransportError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    pub fn advertise(&self, topic: &str, schema: &str, queue_size: u32) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.advertise(topic, schema, queue_size)
    }

    pub fn unadvertise(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.unadvertise(topic)
    }

    pub fn subscribe(
        &self,
        topic: &str,
        schema: &str,
        queue_length: u32,
        callback: DocumentCallback,
    ) -> Result<(), TransportError> {
        self.ensure_live()?;
        let gate = Arc::clone(&self.gate);
        let gated: DocumentCallback = Arc::new(move |document| {
            if gate.load(Ordering::Acquire) {
                callback(document);
            }
        });
        self.transport.subscribe(topic, schema, queue_length, gated)
    }

    pub fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.unsubscribe(topic)
    }

    pub fn publish(&self, topic: &str, document: Document) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.publish(topic, document)
    }

    pub fn advertise_service(
        &self,
        service: &str,
        service_type: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError> {
        self.ensure_live()?;
        let gate = Arc::clone(&self.gate);
        let gated: ServiceHandler = Arc::new(move |request| {
            if gate.load(Ordering::Acquire) {
                handler(request)
            } else {
                None
            }
        });
        self.transport.advertise_service(service, service_type, gated)
    }

    pub fn unadvertise_service(&self, service: &str) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.unadvertise_service(service)
    }

    pub fn call_service(
        &self,
        service: &str,
        args: Document,
        callback: ResponseCallback,
    ) -> Result<(), TransportError> {
        self.ensure_live()?;
        let gate = Arc::clone(&self.gate);
        let gated: ResponseCallback = Box::new(move |response| {
            if gate.load(Ordering::Acquire) {
                callback(response);
            }
        });
        self.transport.call_service(service, args, gated)
    }
}

impl Drop for ConnectionCore {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ConnectionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCore")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::testing::{Call, FakeNetwork};

    fn core(net: &Arc<FakeNetwork>) -> ConnectionCore {
        ConnectionCore::new(Endpoint::default(), net.transport(), Timeouts::default())
    }

    #[tokio::test]
    async fn init_connects_once() {
        let net = FakeNetwork::new();
        let core = core(&net);
        assert!(!core.is_live());
        assert!(core.init().await);
        assert!(core.init().await);
        assert!(core.is_live());
        assert_eq!(net.connect_attempts(), 1);
        assert!(core.last_health_check().is_some());
    }

    #[tokio::test]
    async fn init_fails_when_unreachable() {
        let net = FakeNetwork::new();
        net.set_reachable(false);
        let core = core(&net);
        assert!(!core.init().await);
        assert!(!core.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn init_times_out() {
        let net = FakeNetwork::new();
        let _gate = net.hold_connect();
        let core = core(&net);
        assert!(!core.init().await);
        assert!(!core.is_live());
    }

    #[tokio::test]
    async fn primitives_require_a_live_link() {
        let net = FakeNetwork::new();
        let core = core(&net);
        assert_eq!(
            core.advertise("/chatter", "std_msgs/String", 10),
            Err(TransportError::NotConnected)
        );
        assert!(net.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_probe_marks_core_dead() {
        let net = FakeNetwork::new();
        let core = core(&net);
        assert!(core.init().await);
        assert!(core.is_healthy().await);
        net.set_healthy(false);
        assert!(!core.is_healthy().await);
        assert!(!core.is_live());
    }

    #[tokio::test]
    async fn no_callbacks_after_teardown() {
        let net = FakeNetwork::new();
        let core = core(&net);
        assert!(core.init().await);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        core.subscribe(
            "/chatter",
            "std_msgs/String",
            1,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert!(net.deliver("/chatter", Document::new()));
        core.teardown();
        net.deliver("/chatter", Document::new());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(net.calls().last(), Some(&Call::Close));
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let net = FakeNetwork::new();
        let core = core(&net);
        assert!(core.init().await);
        core.teardown();
        core.teardown();
        drop(core);
        let closes = net.calls().iter().filter(|c| **c == Call::Close).count();
        assert_eq!(closes, 1);
    }
}
