//! # simbridge-transport
//!
//! rosbridge transports for `simbridge-sdk`.
//!
//! Frames are BSON documents using the rosbridge v2 operation envelopes
//! (`advertise`, `publish`, `subscribe`, `call_service`, ...). Message
//! bodies produced by the SDK converters travel in `msg`, `args` and
//! `values`.
//!
//! ## Supported Links
//!
//! - **TCP** (`tcp` feature, default) - raw BSON documents back to back,
//!   as served by `rosbridge_tcp` with `bson_only_mode`
//! - **WebSocket** (`websocket` feature) - one document per binary message
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simbridge_sdk::{Bridge, Endpoint};
//! use simbridge_transport::RosbridgeFactory;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bridge = Bridge::builder(RosbridgeFactory::new())
//!         .endpoint(Endpoint::tcp("127.0.0.1", 9090))
//!         .build();
//!
//!     bridge.connect().await;
//! }
//! ```

mod dispatch;
pub mod error;
pub mod framing;
mod link;
pub mod protocol;
mod rosbridge;

#[cfg(feature = "tcp")]
mod tcp;

#[cfg(feature = "websocket")]
mod websocket;

pub use error::ProtocolError;
pub use rosbridge::{RosbridgeFactory, RosbridgeTransport, TransportConfig, DEFAULT_QUEUE_CAPACITY};
