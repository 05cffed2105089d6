//! The entry point tying registry, channels and supervisor together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::channel::{Channel, ChannelKind, ChannelSet};
use crate::connection::Timeouts;
use crate::error::ChannelError;
use crate::registry::MessageRegistry;
use crate::supervisor::{
    ConnectOutcome, ConnectionStatus, ConnectionSupervisor, HealthCheckHandle, SupervisorConfig,
    TickOutcome,
};
use crate::transport::{Endpoint, TransportFactory};

/// A client of one rosbridge server.
///
/// # Example
///
/// ```rust,ignore
/// use simbridge_sdk::{Bridge, Endpoint};
/// use simbridge_types::StringMessage;
///
/// let bridge = Bridge::builder(factory)
///     .endpoint(Endpoint::tcp("127.0.0.1", 9090))
///     .build();
///
/// bridge.connect().await;
/// let _health = bridge.start_health_checks();
///
/// let chatter = bridge.topic("/chatter", "std_msgs/String", 10)?;
/// chatter.publish(&StringMessage::new("hello").into())?;
/// ```
#[derive(Debug)]
pub struct Bridge {
    registry: Arc<MessageRegistry>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl Bridge {
    /// Start configuring a bridge that builds transports with `factory`.
    pub fn builder(factory: impl TransportFactory + 'static) -> BridgeBuilder {
        BridgeBuilder::new(Arc::new(factory))
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Establish the first connection.
    pub async fn connect(&self) -> ConnectOutcome {
        self.supervisor.connect().await
    }

    /// Create a topic channel.
    pub fn topic(&self, name: &str, schema: &str, queue_depth: u32) -> Result<Channel, ChannelError> {
        self.channel(ChannelKind::Topic, name, schema, queue_depth)
    }

    /// Create a service channel for `service_type` (e.g. `std_srvs/SetBool`).
    pub fn service(&self, name: &str, service_type: &str) -> Result<Channel, ChannelError> {
        self.channel(ChannelKind::Service, name, service_type, 1)
    }

    fn channel(
        &self,
        kind: ChannelKind,
        name: &str,
        schema: &str,
        queue_depth: u32,
    ) -> Result<Channel, ChannelError> {
        let connection = self.supervisor.connection();
        Channel::init(
            self.supervisor.channels(),
            &self.registry,
            connection.as_ref(),
            kind,
            name,
            schema,
            queue_depth,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.supervisor.subscribe_status()
    }

    /// Run one health check immediately.
    pub async fn check_health(&self) -> TickOutcome {
        self.supervisor.on_health_check_tick().await
    }

    /// Spawn periodic health checks.
    pub fn start_health_checks(&self) -> HealthCheckHandle {
        self.supervisor.start()
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await
    }
}

/// Builder for a [`Bridge`].
pub struct BridgeBuilder {
    factory: Arc<dyn TransportFactory>,
    registry: Option<Arc<MessageRegistry>>,
    config: SupervisorConfig,
}

impl BridgeBuilder {
    fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            registry: None,
            config: SupervisorConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Use `registry` instead of one holding the built-in converters.
    pub fn registry(mut self, registry: Arc<MessageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the health check period. Values under one second are raised to one second.
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.config.health_check_interval = interval;
        self
    }

    pub fn check_health(mut self, enabled: bool) -> Self {
        self.config.check_health = enabled;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn build(self) -> Bridge {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(MessageRegistry::with_builtin()));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            self.config,
            self.factory,
            ChannelSet::new(),
        ));
        Bridge {
            registry,
            supervisor,
        }
    }
}

impl std::fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
