//! YFP Client Library
//!
//! Streams camera frames from a capture device to a YFP detection server and
//! delivers the server's results back to the application.
//!
//! # Example
//!
//! ```ignore
//! use yfp_client::prelude::*;
//!
//! struct Overlay;
//!
//! impl ClientHandler for Overlay {
//!     fn on_detections(&mut self, detections: DetectionSet) {
//!         println!("frame {}: {} objects", detections.frame_id, detections.detections.len());
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let (client, events) = StreamClient::builder().device_name("Pixel").build()?;
//!     client.connect("192.168.1.20".parse().unwrap());
//!
//!     let mut overlay = Overlay;
//!     loop {
//!         events.dispatch_pending(&mut overlay);
//!         // capture and client.send_frame(...)
//!     }
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
mod receiver;
pub mod state;

pub use builder::ClientBuilder;
pub use client::StreamClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{ClientEvent, ClientHandler, EventReceiver};
pub use state::ConnectionState;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::StreamClient;
    pub use crate::config::ClientConfig;
    pub use crate::error::{ClientError, Result};
    pub use crate::events::{ClientEvent, ClientHandler, EventReceiver};
    pub use crate::state::ConnectionState;
    pub use yfp_core::{Detection, DetectionSet, MetricsSample};
}
