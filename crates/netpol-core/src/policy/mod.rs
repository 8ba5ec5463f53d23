//! Policy rule model.
//!
//! A `Rule` composes an endpoint selector with ordered ingress and egress
//! sections. Egress entries may reference data that must be resolved before
//! enforcement; `Rule::create_derivative` turns such a rule into its concrete
//! form without touching the source value.

pub mod derive;
pub mod egress;
pub mod ingress;
pub mod rule;
pub mod variants;

pub use derive::{Derivative, GroupResolver, StaticGroups};
pub use egress::EgressRule;
pub use ingress::IngressRule;
pub use rule::{DerivativeError, Rule};
pub use variants::{CidrRule, FqdnSelector, GroupSelector, L4Proto, PortProtocol, PortRule};
