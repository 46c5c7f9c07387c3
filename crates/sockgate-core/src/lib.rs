//! `sockgate` Core Library
//!
//! Shared functionality for `sockgate` components:
//! - Tracing subscriber initialisation
//! - Discovery of the host names and addresses a server certificate must cover

pub mod hosts;
pub mod tracing_init;

pub use hosts::{interface_ipv4_addresses, resolve_hosts};
