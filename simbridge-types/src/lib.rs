//! # simbridge-types
//!
//! Plain message values for the schemas a simulation exchanges with a
//! rosbridge server. This crate has no I/O and no wire format; encoding
//! lives in `simbridge-sdk`.
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for every message value
//!   (used by the application to read static frames from config files)
//!
//! ## Example
//!
//! ```rust
//! use simbridge_types::{Message, TfMessage, TransformStamped, Vector3, schema};
//!
//! let tf = TfMessage::new(vec![TransformStamped::new("world", "robot1")
//!     .with_translation(Vector3::new(1.0, 2.0, 3.0))]);
//!
//! let message = Message::from(tf);
//! assert_eq!(message.schema(), schema::TF_MESSAGE);
//! ```

mod geometry;
mod message;
pub mod schema;
mod std_msgs;
mod std_srvs;
mod tf2;
mod time;

pub use geometry::*;
pub use message::*;
pub use std_msgs::*;
pub use std_srvs::*;
pub use tf2::*;
pub use time::*;
