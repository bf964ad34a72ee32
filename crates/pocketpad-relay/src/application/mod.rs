//! Application layer: session policy and command translation.
//!
//! These modules are pure with respect to I/O.  The WebSocket server feeds
//! them decoded client commands and forwards whatever they produce to the
//! bridge transport, which keeps the policy unit-testable without sockets.

pub mod authorize;
pub mod dispatch;
