//! Top-level facade crate for netpol.
//!
//! Re-exports the rule model and the agent library so users can depend on a single crate.

pub mod core {
    pub use netpol_core::*;
}

pub mod agent {
    pub use netpol_agent::*;
}
