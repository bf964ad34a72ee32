//! Infrastructure layer: everything that touches the OS or the network.
//!
//! - [`bridge`]: the native input helper process and its transport seam.
//! - [`ws_server`]: WebSocket listener, handshake and per-session loop.
//! - [`pairing`]: local address discovery for the pairing payload.

pub mod bridge;
pub mod pairing;
pub mod ws_server;
