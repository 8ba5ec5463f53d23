//! The "may require a derivative" capability of rule variants.
//!
//! A variant that references something only resolvable outside the rule
//! (address groups today) reports `requires_derivative` and knows how to
//! produce a concrete copy of itself. The rule aggregate drives this without
//! knowing which variant it is talking to.

use std::collections::HashMap;

use crate::error::{NetpolError, Result};

use super::variants::{CidrRule, GroupSelector};

/// Capability implemented by each derivable rule variant.
///
/// `Context` is whatever the variant resolves against: egress entries take a
/// [`GroupResolver`], a name-based variant would take its own lookup.
pub trait Derivative: Sized {
    type Context: ?Sized;

    /// Pure predicate; must not perform lookups.
    fn requires_derivative(&self) -> bool;

    /// Produce the concrete form. Never mutates `self`.
    fn create_derivative(&self, ctx: &Self::Context) -> Result<Self>;
}

/// Resolves an address group to the prefixes it currently contains.
pub trait GroupResolver: Send + Sync {
    fn resolve(&self, group: &GroupSelector) -> Result<Vec<CidrRule>>;
}

/// Fixed `(provider, name) -> prefixes` table.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    groups: HashMap<GroupSelector, Vec<String>>,
}

impl StaticGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group<I, S>(mut self, group: GroupSelector, cidrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(group, cidrs.into_iter().map(Into::into).collect());
        self
    }
}

impl GroupResolver for StaticGroups {
    fn resolve(&self, group: &GroupSelector) -> Result<Vec<CidrRule>> {
        let cidrs = self.groups.get(group).ok_or_else(|| {
            NetpolError::Derivation(format!(
                "unknown group {}/{}",
                group.provider, group.name
            ))
        })?;
        Ok(cidrs.iter().map(|c| CidrRule::new(c.clone())).collect())
    }
}
