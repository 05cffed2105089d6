//! simbridge - connect a real-time simulation to a rosbridge server.
//!
//! The binary in `main.rs` wires these pieces together; they are exposed
//! as a library so other simulations can embed the same lifecycle.
//!
//! ## Example
//!
//! ```rust
//! use simbridge::{App, Settings};
//!
//! # tokio_test::block_on(async {
//! let mut settings = Settings::default();
//! settings.bridge.connect_to_ros = false;
//!
//! let app = App::start(&settings).await.unwrap();
//! assert!(app.bridge().is_none());
//! app.shutdown().await;
//! # });
//! ```
//!
//! With a bridge configured, `App::start` connects, starts health checks,
//! and spawns the `/clock` and `/tf` publishers on the current runtime.

pub mod app;
pub mod clock;
pub mod settings;
pub mod tf;

pub use app::App;
pub use settings::Settings;
