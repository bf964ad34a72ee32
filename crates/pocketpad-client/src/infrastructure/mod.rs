//! Infrastructure layer: everything that touches the network.

pub mod network;
