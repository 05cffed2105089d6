//! Named topic and service endpoints.
//!
//! A [`Channel`] is a cheap, cloneable handle. It never owns the
//! connection: it holds a `Weak` reference that the supervisor rebinds
//! after every reconnect, and it remembers what it had advertised or
//! subscribed so that state can be restored on the new connection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use simbridge_types::{schema, Message};
use tracing::{debug, warn};

use crate::convert::MessageConverter;
use crate::error::{ChannelError, TransportError};
use crate::registry::MessageRegistry;
use crate::transport::{DocumentCallback, ResponseCallback, ServiceHandler};
use crate::ConnectionCore;

/// Called with every decoded message on a subscribed topic.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Answers a decoded service request. `None` reports failure to the caller.
pub type RequestHandler = Arc<dyn Fn(Message) -> Option<Message> + Send + Sync>;

/// What a channel is bound to on the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Topic,
    Service,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Topic => "topic",
            ChannelKind::Service => "service",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Bound to a live connection, nothing registered with the bridge.
    Initialized,
    /// Advertised and/or subscribed on a live connection.
    Active { advertised: bool, subscribed: bool },
    /// No live connection.
    Disconnected,
    /// Restoring state onto a new connection.
    Reconnecting,
}

enum Codec {
    Topic(Arc<dyn MessageConverter>),
    Service {
        request: Arc<dyn MessageConverter>,
        response: Arc<dyn MessageConverter>,
    },
}

#[derive(Default)]
struct Flags {
    connection: Weak<ConnectionCore>,
    connected: bool,
    advertised: bool,
    subscribed: bool,
    reconnecting: bool,
    // What to restore after a reconnect.
    keep_advertised: bool,
    subscription: Option<MessageCallback>,
    handler: Option<RequestHandler>,
}

struct ChannelInner {
    id: u64,
    kind: ChannelKind,
    name: String,
    schema: String,
    queue_depth: u32,
    codec: Codec,
    flags: Mutex<Flags>,
    set: Weak<ChannelSet>,
}

/// A topic or service on the bridge.
///
/// Clones share state. When the last clone is dropped the channel
/// unadvertises and then unsubscribes, in that order.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Validate and bind a new channel.
    ///
    /// Fails when the name or schema is empty, or when the registry has no
    /// converter for the schema (for services: for its request and
    /// response types). `connection` may be absent; the channel then
    /// starts disconnected and is bound by the next reconnect.
    pub(crate) fn init(
        set: &Arc<ChannelSet>,
        registry: &MessageRegistry,
        connection: Option<&Arc<ConnectionCore>>,
        kind: ChannelKind,
        name: &str,
        schema_name: &str,
        queue_depth: u32,
    ) -> Result<Self, ChannelError> {
        if name.is_empty() {
            return Err(ChannelError::InvalidName);
        }
        if schema_name.is_empty() {
            return Err(ChannelError::InvalidSchema);
        }

        let codec = match kind {
            ChannelKind::Topic => Codec::Topic(registry.lookup(schema_name)?),
            ChannelKind::Service => Codec::Service {
                request: registry.lookup(&schema::request_of(schema_name))?,
                response: registry.lookup(&schema::response_of(schema_name))?,
            },
        };

        let flags = Flags {
            connection: connection.map(Arc::downgrade).unwrap_or_default(),
            connected: connection.is_some_and(|c| c.is_live()),
            ..Flags::default()
        };

        let inner = Arc::new(ChannelInner {
            id: set.next_id(),
            kind,
            name: name.to_string(),
            schema: schema_name.to_string(),
            queue_depth,
            codec,
            flags: Mutex::new(flags),
            set: Arc::downgrade(set),
        });
        set.insert(&inner);
        debug!(channel = %inner.name, kind = %kind, schema = %inner.schema, "Channel created");
        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &str {
        &self.inner.schema
    }

    pub fn kind(&self) -> ChannelKind {
        self.inner.kind
    }

    pub fn queue_depth(&self) -> u32 {
        self.inner.queue_depth
    }

    pub fn is_connected(&self) -> bool {
        self.inner.flags.lock().connected
    }

    pub fn is_advertised(&self) -> bool {
        self.inner.flags.lock().advertised
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.flags.lock().subscribed
    }

    pub fn state(&self) -> ChannelState {
        let flags = self.inner.flags.lock();
        if flags.reconnecting {
            ChannelState::Reconnecting
        } else if !flags.connected {
            ChannelState::Disconnected
        } else if flags.advertised || flags.subscribed {
            ChannelState::Active {
                advertised: flags.advertised,
                subscribed: flags.subscribed,
            }
        } else {
            ChannelState::Initialized
        }
    }

    /// Announce this topic as published by us. No-op if already advertised.
    pub fn advertise(&self) -> Result<(), ChannelError> {
        self.inner.require(ChannelKind::Topic, "advertise")?;
        let mut flags = self.inner.flags.lock();
        self.inner.advertise_locked(&mut flags)
    }

    /// Withdraw the advertisement. No-op if not advertised.
    pub fn unadvertise(&self) -> Result<(), ChannelError> {
        let mut flags = self.inner.flags.lock();
        self.inner.unadvertise_locked(&mut flags)
    }

    /// Deliver every decoded message on this topic to `callback`.
    ///
    /// No-op if already subscribed. Incoming documents that fail to decode
    /// are logged and dropped.
    pub fn subscribe<F>(&self, callback: F) -> Result<(), ChannelError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.inner.require(ChannelKind::Topic, "subscribe")?;
        let mut flags = self.inner.flags.lock();
        if flags.subscribed {
            return Ok(());
        }
        let callback: MessageCallback = Arc::new(callback);
        self.inner.subscribe_locked(&mut flags, &callback)?;
        flags.subscription = Some(callback);
        Ok(())
    }

    /// Stop receiving messages. No-op if not subscribed.
    pub fn unsubscribe(&self) -> Result<(), ChannelError> {
        let mut flags = self.inner.flags.lock();
        self.inner.unsubscribe_locked(&mut flags)
    }

    /// Encode and send `value`, advertising first if needed.
    ///
    /// The value is only read; the transport receives its own document.
    pub fn publish(&self, value: &Message) -> Result<(), ChannelError> {
        self.inner.require(ChannelKind::Topic, "publish")?;
        let Codec::Topic(converter) = &self.inner.codec else {
            return Err(self.inner.unsupported("publish"));
        };

        let connection = {
            let mut flags = self.inner.flags.lock();
            let connection = self.inner.connection(&flags)?;
            if !flags.advertised {
                self.inner.advertise_locked(&mut flags)?;
            }
            connection
        };

        let document = converter.encode(value)?;
        connection
            .publish(&self.inner.name, document)
            .map_err(|e| self.inner.transport_error(e))
    }

    /// Serve this service with `handler`. No-op if already advertised.
    pub fn advertise_service<F>(&self, handler: F) -> Result<(), ChannelError>
    where
        F: Fn(Message) -> Option<Message> + Send + Sync + 'static,
    {
        self.inner.require(ChannelKind::Service, "advertise_service")?;
        let mut flags = self.inner.flags.lock();
        if flags.advertised {
            return Ok(());
        }
        let handler: RequestHandler = Arc::new(handler);
        self.inner.advertise_service_locked(&mut flags, &handler)?;
        flags.handler = Some(handler);
        flags.keep_advertised = true;
        Ok(())
    }

    /// Call the remote service. `callback` receives the decoded response,
    /// or the reason the call failed, exactly once.
    pub fn call<F>(&self, request: &Message, callback: F) -> Result<(), ChannelError>
    where
        F: FnOnce(Result<Message, ChannelError>) + Send + 'static,
    {
        self.inner.require(ChannelKind::Service, "call")?;
        let Codec::Service { request: encoder, response } = &self.inner.codec else {
            return Err(self.inner.unsupported("call"));
        };

        let connection = {
            let flags = self.inner.flags.lock();
            self.inner.connection(&flags)?
        };
        let args = encoder.encode(request)?;
        let response = Arc::clone(response);
        let on_response: ResponseCallback = Box::new(move |result| {
            let decoded = result
                .map_err(ChannelError::Transport)
                .and_then(|document| response.decode(&document).map_err(ChannelError::from));
            callback(decoded);
        });
        connection
            .call_service(&self.inner.name, args, on_response)
            .map_err(|e| self.inner.transport_error(e))
    }

    /// Forget the connection. Flags are cleared but the advertise and
    /// subscribe intent is kept for [`reconnect`](Self::reconnect).
    /// Idempotent.
    pub fn mark_disconnected(&self) {
        let mut flags = self.inner.flags.lock();
        flags.connection = Weak::new();
        flags.connected = false;
        flags.advertised = false;
        flags.subscribed = false;
    }

    /// Bind to `connection` and restore the previous advertise and
    /// subscribe state on it.
    ///
    /// Both restorations are attempted even if the first fails; the first
    /// error is returned and the channel is left disconnected.
    pub fn reconnect(&self, connection: &Arc<ConnectionCore>) -> Result<(), ChannelError> {
        let mut flags = self.inner.flags.lock();
        flags.reconnecting = true;
        flags.connection = Arc::downgrade(connection);
        flags.connected = connection.is_live();
        flags.advertised = false;
        flags.subscribed = false;

        let result = if flags.connected {
            self.inner.restore_locked(&mut flags)
        } else {
            Err(ChannelError::NotConnected(self.inner.name.clone()))
        };

        if result.is_err() {
            flags.connected = false;
            flags.advertised = false;
            flags.subscribed = false;
        }
        flags.reconnecting = false;
        result
    }

    /// Unadvertise, then unsubscribe, and forget any restore intent.
    /// Errors are logged.
    pub fn release(&self) {
        let mut flags = self.inner.flags.lock();
        self.inner.release_locked(&mut flags);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("schema", &self.inner.schema)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelInner {
    fn require(&self, kind: ChannelKind, op: &'static str) -> Result<(), ChannelError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(self.unsupported(op))
        }
    }

    fn unsupported(&self, op: &'static str) -> ChannelError {
        ChannelError::Unsupported {
            op,
            kind: self.kind.as_str(),
            name: self.name.clone(),
        }
    }

    fn not_connected(&self) -> ChannelError {
        ChannelError::NotConnected(self.name.clone())
    }

    fn transport_error(&self, error: TransportError) -> ChannelError {
        match error {
            TransportError::NotConnected => self.not_connected(),
            other => ChannelError::Transport(other),
        }
    }

    fn connection(&self, flags: &Flags) -> Result<Arc<ConnectionCore>, ChannelError> {
        if !flags.connected {
            return Err(self.not_connected());
        }
        flags
            .connection
            .upgrade()
            .filter(|c| c.is_live())
            .ok_or_else(|| self.not_connected())
    }

    fn advertise_locked(&self, flags: &mut Flags) -> Result<(), ChannelError> {
        if flags.advertised {
            return Ok(());
        }
        let connection = self.connection(flags)?;
        connection
            .advertise(&self.name, &self.schema, self.queue_depth)
            .map_err(|e| self.transport_error(e))?;
        flags.advertised = true;
        flags.keep_advertised = true;
        Ok(())
    }

    fn advertise_service_locked(
        &self,
        flags: &mut Flags,
        handler: &RequestHandler,
    ) -> Result<(), ChannelError> {
        let Codec::Service { request, response } = &self.codec else {
            return Err(self.unsupported("advertise_service"));
        };
        let connection = self.connection(flags)?;

        let request = Arc::clone(request);
        let response = Arc::clone(response);
        let handler = Arc::clone(handler);
        let name = self.name.clone();
        let serve: ServiceHandler = Arc::new(move |args| {
            let decoded = match request.decode(&args) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(service = %name, error = %e, "Dropping malformed service request");
                    return None;
                }
            };
            let reply = handler(decoded)?;
            match response.encode(&reply) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(service = %name, error = %e, "Could not encode service response");
                    None
                }
            }
        });

        connection
            .advertise_service(&self.name, &self.schema, serve)
            .map_err(|e| self.transport_error(e))?;
        flags.advertised = true;
        Ok(())
    }

    fn unadvertise_locked(&self, flags: &mut Flags) -> Result<(), ChannelError> {
        flags.keep_advertised = false;
        flags.handler = None;
        if !flags.advertised {
            return Ok(());
        }
        let connection = self.connection(flags)?;
        let result = match self.kind {
            ChannelKind::Topic => connection.unadvertise(&self.name),
            ChannelKind::Service => connection.unadvertise_service(&self.name),
        };
        flags.advertised = false;
        result.map_err(|e| self.transport_error(e))
    }

    fn subscribe_locked(
        &self,
        flags: &mut Flags,
        callback: &MessageCallback,
    ) -> Result<(), ChannelError> {
        let Codec::Topic(converter) = &self.codec else {
            return Err(self.unsupported("subscribe"));
        };
        let connection = self.connection(flags)?;

        let converter = Arc::clone(converter);
        let callback = Arc::clone(callback);
        let name = self.name.clone();
        let deliver: DocumentCallback = Arc::new(move |document| {
            match converter.decode(&document) {
                Ok(message) => callback(message),
                Err(e) => warn!(topic = %name, error = %e, "Dropping malformed message"),
            }
        });

        connection
            .subscribe(&self.name, &self.schema, self.queue_depth, deliver)
            .map_err(|e| self.transport_error(e))?;
        flags.subscribed = true;
        Ok(())
    }

    fn unsubscribe_locked(&self, flags: &mut Flags) -> Result<(), ChannelError> {
        flags.subscription = None;
        if !flags.subscribed {
            return Ok(());
        }
        let connection = self.connection(flags)?;
        let result = connection.unsubscribe(&self.name);
        flags.subscribed = false;
        result.map_err(|e| self.transport_error(e))
    }

    fn restore_locked(&self, flags: &mut Flags) -> Result<(), ChannelError> {
        let mut first_error = None;

        if flags.keep_advertised {
            let advertised = match (self.kind, flags.handler.clone()) {
                (ChannelKind::Topic, _) => self.advertise_locked(flags),
                (ChannelKind::Service, Some(handler)) => {
                    self.advertise_service_locked(flags, &handler)
                }
                (ChannelKind::Service, None) => Ok(()),
            };
            if let Err(e) = advertised {
                first_error.get_or_insert(e);
            }
        }

        if let Some(callback) = flags.subscription.clone() {
            if let Err(e) = self.subscribe_locked(flags, &callback) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release_locked(&self, flags: &mut Flags) {
        if let Err(e) = self.unadvertise_locked(flags) {
            debug!(channel = %self.name, error = %e, "Unadvertise failed during release");
        }
        if let Err(e) = self.unsubscribe_locked(flags) {
            debug!(channel = %self.name, error = %e, "Unsubscribe failed during release");
        }
        flags.advertised = false;
        flags.subscribed = false;
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let flags = self.flags.get_mut();
        let mut flags = std::mem::take(flags);
        self.release_locked(&mut flags);
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

/// Every live channel created through one bridge.
///
/// Holds only weak references; dropping the last [`Channel`] handle
/// removes it from the set.
#[derive(Default)]
pub struct ChannelSet {
    next_id: AtomicU64,
    channels: RwLock<BTreeMap<u64, Weak<ChannelInner>>>,
}

impl ChannelSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, inner: &Arc<ChannelInner>) {
        self.channels.write().insert(inner.id, Arc::downgrade(inner));
    }

    fn remove(&self, id: u64) {
        self.channels.write().remove(&id);
    }

    /// Snapshot of the channels still alive, in creation order.
    pub fn live(&self) -> Vec<Channel> {
        let channels = self.channels.read();
        channels
            .values()
            .filter_map(Weak::upgrade)
            .map(|inner| Channel { inner })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_all_disconnected(&self) {
        for channel in self.live() {
            channel.mark_disconnected();
        }
    }
}

impl fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSet").field("len", &self.len()).finish()
    }
}
