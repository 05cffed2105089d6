//! Periodic health checking and connection replacement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::channel::ChannelSet;
use crate::connection::{ConnectionCore, Timeouts};
use crate::transport::{Endpoint, TransportFactory};

/// Health checks never run more often than this.
pub const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// The first health check waits at least this long after start.
pub const INITIAL_HEALTH_CHECK_DELAY: Duration = Duration::from_secs(5);

/// Tunables for a [`ConnectionSupervisor`].
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub endpoint: Endpoint,
    pub timeouts: Timeouts,
    /// Period between health checks; floored at [`MIN_HEALTH_CHECK_INTERVAL`].
    pub health_check_interval: Duration,
    /// When false, ticks do nothing.
    pub check_health: bool,
    /// When false, an unhealthy connection is reported but not replaced.
    pub auto_reconnect: bool,
}

impl SupervisorConfig {
    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval.max(MIN_HEALTH_CHECK_INTERVAL)
    }

    /// Delay before the first scheduled tick.
    pub fn initial_delay(&self) -> Duration {
        self.health_check_interval().max(INITIAL_HEALTH_CHECK_DELAY)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            timeouts: Timeouts::default(),
            health_check_interval: MIN_HEALTH_CHECK_INTERVAL,
            check_health: true,
            auto_reconnect: true,
        }
    }
}

/// Connection status as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Result of [`ConnectionSupervisor::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Unreachable,
    /// Another connect or reconnect held the lock.
    InProgress,
}

/// Result of one health-check tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Health checking is switched off.
    Disabled,
    /// A reconnect was already running; this tick did nothing.
    Skipped,
    /// The current connection answered its probe.
    Healthy,
    /// The connection was replaced and every channel restored.
    Reconnected,
    /// The connection was replaced but some channels could not be restored.
    PartiallyReconnected { failed: usize },
    /// A new connection could not be established. The next tick retries.
    ReconnectFailed,
    /// The connection is down and automatic reconnection is off.
    Lost,
    /// The supervisor has been shut down.
    ShutDown,
}

/// Owns the current [`ConnectionCore`] and replaces it when it fails.
///
/// All connection replacement happens under a non-blocking lock: a tick
/// that finds the lock held returns [`TickOutcome::Skipped`] instead of
/// waiting, so at most one reconnect is ever in flight.
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    factory: Arc<dyn TransportFactory>,
    channels: Arc<ChannelSet>,
    current: RwLock<Option<Arc<ConnectionCore>>>,
    connected: AtomicBool,
    shut_down: AtomicBool,
    reconnect_lock: Mutex<()>,
    status: watch::Sender<ConnectionStatus>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: SupervisorConfig,
        factory: Arc<dyn TransportFactory>,
        channels: Arc<ChannelSet>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            config,
            factory,
            channels,
            current: RwLock::new(None),
            connected: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            reconnect_lock: Mutex::new(()),
            status,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn channels(&self) -> &Arc<ChannelSet> {
        &self.channels
    }

    /// The current connection, if one has been installed.
    pub fn connection(&self) -> Option<Arc<ConnectionCore>> {
        self.current.read().clone()
    }

    /// Global connected flag.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether a connect or reconnect currently holds the lock.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnect_lock.try_lock().is_err()
    }

    /// Observe status changes. Every healthy tick re-sends `Connected`.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Establish the first connection and bind any existing channels to it.
    pub async fn connect(&self) -> ConnectOutcome {
        if self.shut_down.load(Ordering::Acquire) {
            return ConnectOutcome::Unreachable;
        }
        let Ok(_guard) = self.reconnect_lock.try_lock() else {
            return ConnectOutcome::InProgress;
        };

        match self.replace_connection().await {
            Some(connection) => {
                self.reconnect_channels(&connection);
                ConnectOutcome::Connected
            }
            None => {
                self.notify(ConnectionStatus::Disconnected);
                ConnectOutcome::Unreachable
            }
        }
    }

    /// Run one health check and, if needed, one reconnect attempt.
    ///
    /// A failed reconnect is not retried within the tick; the next tick
    /// tries again.
    pub async fn on_health_check_tick(&self) -> TickOutcome {
        if self.shut_down.load(Ordering::Acquire) {
            return TickOutcome::ShutDown;
        }
        if !self.config.check_health {
            return TickOutcome::Disabled;
        }
        let Ok(_guard) = self.reconnect_lock.try_lock() else {
            debug!("Reconnect already in progress, skipping health check");
            return TickOutcome::Skipped;
        };

        if self.is_connected() {
            let healthy = match self.connection() {
                Some(connection) => connection.is_healthy().await,
                None => false,
            };
            if healthy {
                self.notify(ConnectionStatus::Connected);
                return TickOutcome::Healthy;
            }
            error!(endpoint = %self.config.endpoint, "Connection to bridge lost");
            self.connected.store(false, Ordering::Release);
            self.notify(ConnectionStatus::Disconnected);
        }

        if !self.config.auto_reconnect {
            self.channels.mark_all_disconnected();
            let old = self.current.write().take();
            if let Some(old) = old {
                old.teardown();
            }
            return TickOutcome::Lost;
        }

        let Some(connection) = self.replace_connection().await else {
            return TickOutcome::ReconnectFailed;
        };

        match self.reconnect_channels(&connection) {
            0 => TickOutcome::Reconnected,
            failed => TickOutcome::PartiallyReconnected { failed },
        }
    }

    /// Withdraw every channel and close the connection.
    ///
    /// Waits for any in-flight reconnect. Every channel is unadvertised
    /// and unsubscribed before any is marked disconnected. Later ticks
    /// return [`TickOutcome::ShutDown`].
    pub async fn shutdown(&self) {
        let _guard = self.reconnect_lock.lock().await;
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let channels = self.channels.live();
        for channel in &channels {
            channel.release();
        }
        for channel in &channels {
            channel.mark_disconnected();
        }

        let old = self.current.write().take();
        if let Some(old) = old {
            old.teardown();
        }
        self.connected.store(false, Ordering::Release);
        self.notify(ConnectionStatus::Disconnected);
        info!("Bridge connection shut down");
    }

    /// Spawn the periodic health check.
    ///
    /// The first tick fires after [`SupervisorConfig::initial_delay`], then
    /// every [`SupervisorConfig::health_check_interval`].
    pub fn start(self: &Arc<Self>) -> HealthCheckHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let supervisor = Arc::clone(self);
        let period = self.config.health_check_interval();
        let first = Instant::now() + self.config.initial_delay();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(first, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if supervisor.on_health_check_tick().await == TickOutcome::ShutDown {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        HealthCheckHandle { stop_tx, task }
    }

    /// Tear down the old connection, then build and initialize a new one.
    /// Caller holds the reconnect lock.
    async fn replace_connection(&self) -> Option<Arc<ConnectionCore>> {
        self.channels.mark_all_disconnected();
        let old = self.current.write().take();
        if let Some(old) = old {
            old.teardown();
        }

        let connection = Arc::new(ConnectionCore::new(
            self.config.endpoint.clone(),
            self.factory.create(),
            self.config.timeouts,
        ));
        if !connection.init().await {
            warn!(endpoint = %self.config.endpoint, "Reconnect attempt failed");
            return None;
        }

        *self.current.write() = Some(Arc::clone(&connection));
        Some(connection)
    }

    /// Rebind every live channel to `connection`. Returns how many failed.
    fn reconnect_channels(&self, connection: &Arc<ConnectionCore>) -> usize {
        self.connected.store(true, Ordering::Release);

        let mut failed = 0;
        for channel in self.channels.live() {
            if let Err(e) = channel.reconnect(connection) {
                warn!(channel = %channel.name(), error = %e, "Could not restore channel");
                failed += 1;
            }
        }

        if failed == 0 {
            info!(connection = connection.id(), "Bridge connection established");
            self.notify(ConnectionStatus::Connected);
        } else {
            self.connected.store(false, Ordering::Release);
            self.notify(ConnectionStatus::Disconnected);
        }
        failed
    }

    fn notify(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

/// Handle for the periodic health check task.
///
/// Dropping the handle also stops the task.
pub struct HealthCheckHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HealthCheckHandle {
    /// Stop the task and wait for it to finish its current tick.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
