//! Network Module
//!
//! Blocking client side of the wire protocol.
//!
//! ## Architecture
//! - One TCP stream per client, one request in flight
//! - Session shadow of the selected database index
//! - Typed wrappers for the commands the browser issues

mod client;
mod commands;

pub use client::Client;
pub use commands::ScanPage;
