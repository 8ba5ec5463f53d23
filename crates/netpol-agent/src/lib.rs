//! netpol agent library entry.
//!
//! This crate wires the schema registry, the object-store contract, and the
//! schema lifecycle reconciler into the startup path an enforcement agent
//! runs before it accepts policy. It is consumed by agent binaries and by
//! integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod obs;
pub mod reconcile;
pub mod resource;
pub mod store;
