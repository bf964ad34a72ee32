//! Domain layer for the relay: configuration values and the process token.
//!
//! **Dependency rule**: no OS calls, no network I/O; reading/writing the
//! config file lives here only because the schema and its defaults do.

pub mod config;
