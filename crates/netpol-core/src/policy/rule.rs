//! The `Rule` aggregate and derivation orchestration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{NetpolError, Result};
use crate::labels::LabelArray;
use crate::selector::EndpointSelector;

use super::derive::{Derivative, GroupResolver};
use super::egress::EgressRule;
use super::ingress::IngressRule;

/// A policy rule applied to every endpoint matched by `endpoint_selector`.
///
/// Either section may be omitted; a rule with neither is legal but has no
/// effect. Labels tag the rule for lookup and removal and need not be unique.
/// The description is free text and never identifies a rule.
///
/// Rules are plain values. The `with_*` methods consume the rule and return
/// the updated value, each replacing the previous content of its field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Rule {
    pub endpoint_selector: EndpointSelector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<IngressRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<EgressRule>,
    #[serde(default, skip_serializing_if = "LabelArray::is_empty")]
    pub labels: LabelArray,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Derivation stopped at the first failing egress entry.
///
/// `partial` holds the entries derived before the failure and must not be
/// published.
#[derive(Debug, Error)]
#[error("rule derivation stopped after {} egress entries: {source}", .partial.egress.len())]
pub struct DerivativeError {
    pub partial: Rule,
    pub source: NetpolError,
}

impl DerivativeError {
    pub fn into_parts(self) -> (Rule, NetpolError) {
        (self.partial, self.source)
    }
}

impl Rule {
    /// Empty rule with no selector and no policy.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_selector(mut self, es: EndpointSelector) -> Self {
        self.endpoint_selector = es;
        self
    }

    pub fn with_ingress_rules(mut self, rules: Vec<IngressRule>) -> Self {
        self.ingress = rules;
        self
    }

    pub fn with_egress_rules(mut self, rules: Vec<EgressRule>) -> Self {
        self.egress = rules;
        self
    }

    pub fn with_labels(mut self, labels: LabelArray) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// No ingress and no egress: nothing is enforced.
    pub fn is_inert(&self) -> bool {
        self.ingress.is_empty() && self.egress.is_empty()
    }

    /// Lookup helper: does this rule carry all of `labels`.
    pub fn has_labels(&self, labels: &LabelArray) -> bool {
        self.labels.contains(labels)
    }

    /// Structural checks before the rule is handed to storage.
    pub fn sanitize(&self) -> Result<()> {
        if self.endpoint_selector.is_empty() {
            return Err(NetpolError::BadRequest(
                "endpointSelector must not be empty".into(),
            ));
        }
        for i in &self.ingress {
            i.sanitize()?;
        }
        for e in &self.egress {
            e.sanitize()?;
        }
        Ok(())
    }

    /// True if any egress entry needs a derivative. Ingress is not consulted.
    pub fn requires_derivative(&self) -> bool {
        self.egress.iter().any(|e| e.requires_derivative())
    }

    /// Build the concrete form of this rule.
    ///
    /// Selector, ingress, labels and description are copied; each egress entry
    /// is replaced by its own derivative, in order. On the first failure the
    /// entries derived so far are returned inside the error alongside the
    /// variant's error, untouched. Later entries are not attempted.
    pub fn create_derivative(
        &self,
        resolver: &(dyn GroupResolver + 'static),
    ) -> std::result::Result<Rule, DerivativeError> {
        let mut derived = Rule {
            endpoint_selector: self.endpoint_selector.clone(),
            ingress: self.ingress.clone(),
            egress: Vec::with_capacity(self.egress.len()),
            labels: self.labels.clone(),
            description: self.description.clone(),
        };

        for egress in &self.egress {
            match egress.create_derivative(resolver) {
                Ok(e) => derived.egress.push(e),
                Err(source) => {
                    return Err(DerivativeError {
                        partial: derived,
                        source,
                    })
                }
            }
        }
        Ok(derived)
    }
}
