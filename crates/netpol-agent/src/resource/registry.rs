//! Resource schema registry.
//!
//! Built once at startup and shared read-only (`Arc<SchemaRegistry>`) by every
//! reconciliation. Tests build their own instances through the builder.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use netpol_core::error::{NetpolError, Result};

use super::descriptor::{
    DescriptorSpec, PrinterColumn, ResourceDescriptor, ResourceNames, Scope, ValidationSchema,
};
use super::version::{SchemaVersion, SCHEMA_VERSION_LABEL};

/// API group of every managed kind.
pub const GROUP: &str = "netpol.io";
/// Served API version.
pub const API_VERSION: &str = "v2";
/// Schema version of the descriptors this build installs.
pub const SCHEMA_VERSION: &str = "1.15";

const NETWORK_POLICY_SCHEMA: &[u8] = include_bytes!("../../schemas/networkpolicy.json");
const PERMISSIVE_SCHEMA: &[u8] = b"{}";

/// Managed resource kinds, in install order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    NetworkPolicy,
    Endpoint,
    Node,
    Identity,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::NetworkPolicy,
        ResourceKind::Endpoint,
        ResourceKind::Node,
        ResourceKind::Identity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::NetworkPolicy => "NetworkPolicy",
            ResourceKind::Endpoint => "PolicyEndpoint",
            ResourceKind::Node => "PolicyNode",
            ResourceKind::Identity => "PolicyIdentity",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.as_str(), API_VERSION)
    }
}

/// Desired descriptor plus the version a stored copy must reach.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub kind: ResourceKind,
    pub descriptor: ResourceDescriptor,
    pub schema_version: SchemaVersion,
}

/// Validation documents fed into the built-in descriptors.
#[derive(Debug, Clone)]
pub struct ValidationDocs {
    pub network_policy: Bytes,
    pub endpoint: Bytes,
    pub node: Bytes,
    pub identity: Bytes,
}

impl Default for ValidationDocs {
    fn default() -> Self {
        Self {
            network_policy: Bytes::from_static(NETWORK_POLICY_SCHEMA),
            endpoint: Bytes::from_static(PERMISSIVE_SCHEMA),
            node: Bytes::from_static(PERMISSIVE_SCHEMA),
            identity: Bytes::from_static(PERMISSIVE_SCHEMA),
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<ResourceKind, RegistryEntry>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// The four built-in kinds at [`SCHEMA_VERSION`].
    pub fn builtin(docs: &ValidationDocs) -> Result<Self> {
        let version = SchemaVersion::parse(SCHEMA_VERSION)?;
        let mut b = Self::builder();
        for kind in ResourceKind::ALL {
            let doc = match kind {
                ResourceKind::NetworkPolicy => &docs.network_policy,
                ResourceKind::Endpoint => &docs.endpoint,
                ResourceKind::Node => &docs.node,
                ResourceKind::Identity => &docs.identity,
            };
            let spec = builtin_spec(kind, validation_doc(kind, doc)?);
            b = b.register(kind, ResourceDescriptor::new(spec), version.clone());
        }
        Ok(b.build())
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&RegistryEntry> {
        self.entries.get(&kind)
    }

    pub fn entry(&self, kind: ResourceKind) -> Result<&RegistryEntry> {
        self.get(kind)
            .ok_or_else(|| NetpolError::Internal(format!("kind {kind} not registered")))
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entries: BTreeMap<ResourceKind, RegistryEntry>,
}

impl SchemaRegistryBuilder {
    /// Register `descriptor` for `kind`; the version label is stamped here.
    pub fn register(
        mut self,
        kind: ResourceKind,
        descriptor: ResourceDescriptor,
        schema_version: SchemaVersion,
    ) -> Self {
        let descriptor = descriptor.with_label(SCHEMA_VERSION_LABEL, &schema_version.to_string());
        self.entries.insert(
            kind,
            RegistryEntry {
                kind,
                descriptor,
                schema_version,
            },
        );
        self
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            entries: self.entries,
        }
    }
}

/// Documents are opaque to us but must at least be a JSON object.
fn validation_doc(kind: ResourceKind, doc: &Bytes) -> Result<ValidationSchema> {
    let parsed: serde_json::Value = serde_json::from_slice(doc)
        .map_err(|e| NetpolError::BadRequest(format!("validation document for {kind}: {e}")))?;
    if !parsed.is_object() {
        return Err(NetpolError::BadRequest(format!(
            "validation document for {kind} must be an object"
        )));
    }
    Ok(ValidationSchema(doc.clone()))
}

fn names(plural: &str, singular: &str, short: &[&str], kind: ResourceKind) -> ResourceNames {
    ResourceNames {
        plural: plural.into(),
        singular: singular.into(),
        short_names: short.iter().map(|s| s.to_string()).collect(),
        kind: kind.as_str().into(),
    }
}

fn builtin_spec(kind: ResourceKind, validation: ValidationSchema) -> DescriptorSpec {
    let (names, scope, printer_columns) = match kind {
        ResourceKind::NetworkPolicy => (
            names("networkpolicies", "networkpolicy", &["np", "netpol"], kind),
            Scope::Namespaced,
            Vec::new(),
        ),
        ResourceKind::Endpoint => (
            names("policyendpoints", "policyendpoint", &["pep"], kind),
            Scope::Namespaced,
            endpoint_columns(),
        ),
        ResourceKind::Node => (
            names("policynodes", "policynode", &["pn"], kind),
            Scope::Cluster,
            Vec::new(),
        ),
        ResourceKind::Identity => (
            names("policyidentities", "policyidentity", &["pid"], kind),
            Scope::Cluster,
            Vec::new(),
        ),
    };

    DescriptorSpec {
        group: GROUP.into(),
        version: API_VERSION.into(),
        names,
        scope,
        validation: Some(validation),
        status_subresource: true,
        printer_columns,
    }
}

fn endpoint_columns() -> Vec<PrinterColumn> {
    vec![
        PrinterColumn::new("Endpoint ID", "integer", "Endpoint id", ".status.id"),
        PrinterColumn::new("Identity ID", "integer", "Identity id", ".status.identity.id"),
        PrinterColumn::new(
            "Ingress Enforcement",
            "boolean",
            "Ingress enforcement in the endpoint",
            ".status.policy.ingress.enforcing",
        ),
        PrinterColumn::new(
            "Egress Enforcement",
            "boolean",
            "Egress enforcement in the endpoint",
            ".status.policy.egress.enforcing",
        ),
        PrinterColumn::new("Endpoint State", "string", "Endpoint current state", ".status.state"),
        PrinterColumn::new(
            "IPv4",
            "string",
            "Endpoint IPv4 address",
            ".status.networking.addressing[0].ipv4",
        ),
        PrinterColumn::new(
            "IPv6",
            "string",
            "Endpoint IPv6 address",
            ".status.networking.addressing[0].ipv6",
        ),
    ]
}
