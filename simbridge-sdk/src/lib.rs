//! # simbridge-sdk
//!
//! Client side of a rosbridge link for simulations: typed message
//! conversion, named topic and service channels, and a supervisor that
//! keeps the connection alive.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use simbridge_sdk::{Bridge, Endpoint};
//! use simbridge_transport::RosbridgeFactory;
//! use simbridge_types::{schema, StringMessage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = Endpoint::tcp("127.0.0.1", 9090);
//!     let bridge = Bridge::builder(RosbridgeFactory::new())
//!         .endpoint(endpoint)
//!         .build();
//!
//!     bridge.connect().await;
//!     let health = bridge.start_health_checks();
//!
//!     let chatter = bridge.topic("/chatter", schema::STRING, 10)?;
//!     chatter.subscribe(|message| println!("{message:?}"))?;
//!     chatter.publish(&StringMessage::new("hello").into())?;
//!
//!     bridge.shutdown().await;
//!     health.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! - [`convert`]: message values to and from BSON documents
//! - [`MessageRegistry`]: schema name to converter lookup
//! - [`ConnectionCore`]: one connection, wrapping a [`Transport`]
//! - [`Channel`]: a topic or service bound to the current connection
//! - [`ConnectionSupervisor`]: health checks and reconnection

mod bridge;
mod channel;
mod connection;
pub mod convert;
mod error;
mod registry;
mod supervisor;
mod transport;

#[cfg(test)]
mod testing;

pub use bridge::{Bridge, BridgeBuilder};
pub use channel::{Channel, ChannelKind, ChannelSet, ChannelState, MessageCallback, RequestHandler};
pub use connection::{ConnectionCore, Timeouts};
pub use convert::{Converter, EncodedDocument, MessageConverter, RosMessage};
pub use error::{ChannelError, ConvertError, RegistryError, TransportError};
pub use registry::MessageRegistry;
pub use supervisor::{
    ConnectOutcome, ConnectionStatus, ConnectionSupervisor, HealthCheckHandle, SupervisorConfig,
    TickOutcome, INITIAL_HEALTH_CHECK_DELAY, MIN_HEALTH_CHECK_INTERVAL,
};
pub use transport::{
    DocumentCallback, Endpoint, ResponseCallback, ServiceHandler, Transport, TransportFactory,
};

// Re-exported so downstream crates share one version.
pub use bson;
pub use simbridge_types as types;
