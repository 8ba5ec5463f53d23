use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::selector::EndpointSelector;

use super::variants::{validate_cidr, CidrRule, PortRule};

/// Traffic allowed into the selected endpoints.
///
/// Ingress entries never require a derivative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_endpoints: Vec<EndpointSelector>,
    #[serde(default, rename = "fromCIDR", skip_serializing_if = "Vec::is_empty")]
    pub from_cidr: Vec<String>,
    #[serde(default, rename = "fromCIDRSet", skip_serializing_if = "Vec::is_empty")]
    pub from_cidr_set: Vec<CidrRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_ports: Vec<PortRule>,
}

impl IngressRule {
    pub fn sanitize(&self) -> Result<()> {
        for c in &self.from_cidr {
            validate_cidr(c)?;
        }
        for c in &self.from_cidr_set {
            c.sanitize()?;
        }
        for p in &self.to_ports {
            p.sanitize()?;
        }
        Ok(())
    }
}
