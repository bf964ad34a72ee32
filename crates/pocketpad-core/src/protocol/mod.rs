//! The PocketPad relay wire protocol.
//!
//! Every message is one JSON object per WebSocket text frame, discriminated
//! by a `"type"` field.  The client sends commands (`auth`, `move`, `click`,
//! …); the relay answers only during the auth handshake.

pub mod messages;
pub mod pairing;
