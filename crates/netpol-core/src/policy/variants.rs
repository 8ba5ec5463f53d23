//! Building blocks shared by ingress and egress rules (CIDR, L4, FQDN, groups).
//!
//! Only shape and basic sanity are checked here; matching semantics live in
//! the datapath.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{NetpolError, Result};

/// CIDR prefix plus carve-outs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CidrRule {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
}

impl CidrRule {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            except: Vec::new(),
        }
    }

    pub fn sanitize(&self) -> Result<()> {
        validate_cidr(&self.cidr)?;
        for e in &self.except {
            validate_cidr(e)?;
        }
        Ok(())
    }
}

/// L4 protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum L4Proto {
    Tcp,
    Udp,
    #[default]
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortProtocol {
    pub port: String,
    #[serde(default)]
    pub protocol: L4Proto,
}

/// L4 port set. L7 sections are not modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortProtocol>,
}

impl PortRule {
    pub fn sanitize(&self) -> Result<()> {
        for p in &self.ports {
            parse_digits::<u16>(&p.port).ok_or_else(|| {
                NetpolError::BadRequest(format!("invalid port: {} (expected 0-65535)", p.port))
            })?;
        }
        Ok(())
    }
}

/// DNS name or wildcard pattern the agent resolves out of band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FqdnSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
}

impl FqdnSelector {
    pub fn sanitize(&self) -> Result<()> {
        if self.match_name.is_none() && self.match_pattern.is_none() {
            return Err(NetpolError::BadRequest(
                "toFQDNs entry needs matchName or matchPattern".into(),
            ));
        }
        Ok(())
    }
}

/// Reference to an externally managed address group (e.g. a cloud security group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSelector {
    pub provider: String,
    pub name: String,
}

impl GroupSelector {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }
}

/// Plain decimal digits only; `str::parse` would also take a leading `+`.
fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Accepts `addr/len` or a bare address (host prefix).
pub fn validate_cidr(s: &str) -> Result<()> {
    let bad = || NetpolError::BadRequest(format!("invalid CIDR: {s}"));
    let (addr, len) = match s.split_once('/') {
        Some((a, l)) => (a, Some(l)),
        None => (s, None),
    };
    let ip: IpAddr = addr.parse().map_err(|_| bad())?;
    if let Some(l) = len {
        let bits: u8 = parse_digits(l).ok_or_else(bad)?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return Err(bad());
        }
    }
    Ok(())
}
