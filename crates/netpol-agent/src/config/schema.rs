use std::time::Duration;

use serde::Deserialize;
use netpol_core::error::{NetpolError, Result};

use crate::reconcile::PollConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub reconcile: ReconcileSection,

    #[serde(default)]
    pub resources: ResourcesSection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: 1,
            reconcile: ReconcileSection::default(),
            resources: ResourcesSection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(NetpolError::UnsupportedVersion);
        }

        self.reconcile.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl ReconcileSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10000).contains(&self.poll_interval_ms) {
            return Err(NetpolError::BadRequest(
                "reconcile.poll_interval_ms must be between 1 and 10000".into(),
            ));
        }
        if !(10..=600000).contains(&self.poll_timeout_ms) {
            return Err(NetpolError::BadRequest(
                "reconcile.poll_timeout_ms must be between 10 and 600000".into(),
            ));
        }
        if self.poll_timeout_ms <= self.poll_interval_ms {
            return Err(NetpolError::BadRequest(
                "reconcile.poll_timeout_ms must be greater than poll_interval_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_millis(self.poll_timeout_ms),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}
fn default_poll_timeout_ms() -> u64 {
    60000
}

/// Where security identities are allocated. Only `crd` needs the identity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityAllocationMode {
    #[default]
    Crd,
    Kvstore,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesSection {
    #[serde(default)]
    pub identity_allocation_mode: IdentityAllocationMode,
}
