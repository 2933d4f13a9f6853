//! Wrinkle Scan Server - the HTTP layer.
//!
//! Exposed as a library so endpoint tests can drive the router directly;
//! the `wrinkle-scan` binary is a thin wrapper around these modules.

pub mod cli;
pub mod config;
pub mod routes;
pub mod state;
