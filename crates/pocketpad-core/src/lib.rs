//! # pocketpad-core
//!
//! Shared library for PocketPad containing the relay wire protocol, the
//! native-bridge line codec, and the motion smoothing engine.
//!
//! This crate is used by both the desktop relay and the mobile-side client.
//! It has zero dependencies on sockets, OS APIs, or UI frameworks.
//!
//! # Architecture overview
//!
//! PocketPad turns a phone into a wireless trackpad and keyboard: the mobile
//! client captures touch gestures and streams them to a relay running on the
//! desktop, which replays them as real cursor and keyboard input.
//!
//! This crate (`pocketpad-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – The JSON messages that travel over the WebSocket
//!   between client and relay, plus the pairing payload the desktop embeds
//!   in its QR code.
//!
//! - **`bridge`** – The one-command-per-line text protocol spoken to the
//!   native input bridge, the helper process that performs the actual OS
//!   cursor/keyboard calls.
//!
//! - **`motion`** – The smoothing engine that converts bursty gesture
//!   deltas into a steady cadence of small integer cursor moves.

pub mod bridge;
pub mod motion;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pocketpad_core::ClientCommand` instead of the full module path.
pub use bridge::BridgeCommand;
pub use motion::{MotionBuffer, MotionTick, SmoothingConfig, TICK_INTERVAL};
pub use protocol::messages::{
    decode_client_frame, AuthStatus, ClientCommand, FrameOutcome, MouseButtonName, ServerMessage,
};
pub use protocol::pairing::PairingPayload;
