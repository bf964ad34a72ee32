//! Application layer: touch gesture interpretation.
//!
//! Pure with respect to I/O and time: the UI feeds in touch events with
//! its own millisecond timestamps and forwards the produced commands to
//! the network layer, which keeps the gesture rules unit-testable.

pub mod gestures;
