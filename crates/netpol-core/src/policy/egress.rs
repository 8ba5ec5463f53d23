use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::selector::EndpointSelector;

use super::derive::{Derivative, GroupResolver};
use super::variants::{validate_cidr, CidrRule, FqdnSelector, GroupSelector, PortRule};

/// Traffic the selected endpoints may send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EgressRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_endpoints: Vec<EndpointSelector>,
    #[serde(default, rename = "toCIDR", skip_serializing_if = "Vec::is_empty")]
    pub to_cidr: Vec<String>,
    #[serde(default, rename = "toCIDRSet", skip_serializing_if = "Vec::is_empty")]
    pub to_cidr_set: Vec<CidrRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_ports: Vec<PortRule>,
    #[serde(default, rename = "toFQDNs", skip_serializing_if = "Vec::is_empty")]
    pub to_fqdns: Vec<FqdnSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_groups: Vec<GroupSelector>,
}

impl EgressRule {
    pub fn sanitize(&self) -> Result<()> {
        for c in &self.to_cidr {
            validate_cidr(c)?;
        }
        for c in &self.to_cidr_set {
            c.sanitize()?;
        }
        for p in &self.to_ports {
            p.sanitize()?;
        }
        for f in &self.to_fqdns {
            f.sanitize()?;
        }
        Ok(())
    }
}

impl Derivative for EgressRule {
    type Context = dyn GroupResolver;

    fn requires_derivative(&self) -> bool {
        !self.to_groups.is_empty()
    }

    /// Group references are replaced by the prefixes they resolve to.
    fn create_derivative(&self, resolver: &Self::Context) -> Result<Self> {
        if !self.requires_derivative() {
            return Ok(self.clone());
        }

        let mut out = self.clone();
        out.to_groups.clear();
        for group in &self.to_groups {
            let resolved = resolver.resolve(group)?;
            out.to_cidr_set.extend(resolved);
        }
        Ok(out)
    }
}
