//! netpol core: the policy rule model, labels, selectors, and error types.
//!
//! This crate defines the rule documents exchanged with the policy store and
//! the error surface shared by the agent. It carries no runtime or transport
//! dependencies and performs no I/O.
//!
//! # Lints
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `NetpolError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod labels;
pub mod policy;
pub mod selector;

/// Shared result type.
pub use error::{ErrorCode, NetpolError, Result};
