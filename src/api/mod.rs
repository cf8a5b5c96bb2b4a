//! Backend communication for the fleet console.
//!
//! [`protocol`] defines the request and response shapes, [`transport`] the
//! sending seam, [`websocket`] the live connection and [`demo`] the canned
//! backend behind `--offline`.

pub mod demo;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use demo::DemoBackend;
pub use protocol::{Inbound, Request};
pub use transport::{InboundReceiver, InboundSender, MemoryTransport, Transport, inbound_channel};
pub use websocket::WebSocketTransport;
