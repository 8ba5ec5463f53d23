//! Schema version labels and the "needs update" decision.

use std::fmt;
use std::str::FromStr;

use netpol_core::error::{NetpolError, Result};

use super::descriptor::ResourceDescriptor;

/// Metadata label holding the schema version of a stored descriptor.
pub const SCHEMA_VERSION_LABEL: &str = "netpol.io/crd-schema-version";

/// Semantic version of a descriptor schema.
///
/// Parsing is lenient the way schema labels are written in practice: a
/// leading `v` is dropped and missing minor/patch components read as zero,
/// so `"1.15"` equals `1.15.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(semver::Version);

impl SchemaVersion {
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        let raw = raw.strip_prefix('v').unwrap_or(raw);

        // split off pre-release/build suffix before padding the numeric core
        let cut = raw.find(['-', '+']).unwrap_or(raw.len());
        let (core, suffix) = raw.split_at(cut);
        let padded = match core.matches('.').count() {
            0 => format!("{core}.0.0{suffix}"),
            1 => format!("{core}.0{suffix}"),
            _ => raw.to_string(),
        };

        semver::Version::parse(&padded)
            .map(SchemaVersion)
            .map_err(|e| NetpolError::BadRequest(format!("invalid schema version {s:?}: {e}")))
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl FromStr for SchemaVersion {
    type Err = NetpolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether the stored descriptor must be replaced by the desired one.
///
/// True when it has no validation schema, no version label, an unparsable
/// label, or a label older than `expected`.
pub fn needs_update(observed: &ResourceDescriptor, expected: &SchemaVersion) -> bool {
    if observed.spec.validation.is_none() {
        return true;
    }
    let Some(label) = observed.label(SCHEMA_VERSION_LABEL) else {
        return true;
    };
    match SchemaVersion::parse(label) {
        Ok(v) => v < *expected,
        Err(_) => true,
    }
}
