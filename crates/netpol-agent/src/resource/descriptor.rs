//! Resource descriptor: the schema declaration the store keeps per managed kind.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Namespaced or cluster-wide objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// Names under which the kind is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub plural: String,
    pub singular: String,
    pub short_names: Vec<String>,
    pub kind: String,
}

/// Extra column shown when listing objects of the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterColumn {
    pub name: String,
    pub column_type: String,
    pub description: String,
    pub json_path: String,
}

impl PrinterColumn {
    pub fn new(name: &str, column_type: &str, description: &str, json_path: &str) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            description: description.into(),
            json_path: json_path.into(),
        }
    }
}

/// Opaque validation document. The store interprets it; we only carry it.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidationSchema(pub Bytes);

impl fmt::Debug for ValidationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationSchema({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub group: String,
    pub version: String,
    pub names: ResourceNames,
    pub scope: Scope,
    pub validation: Option<ValidationSchema>,
    pub status_subresource: bool,
    pub printer_columns: Vec<PrinterColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Store-assigned; an update must carry the value it read.
    pub resource_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    NamesAccepted,
    Established,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
}

impl Condition {
    pub fn new(condition_type: ConditionType, status: ConditionStatus, reason: impl Into<String>) -> Self {
        Self {
            condition_type,
            status,
            reason: reason.into(),
        }
    }
}

/// Acceptance state reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorStatus {
    pub conditions: Vec<Condition>,
}

impl DescriptorStatus {
    /// Missing conditions read as `Unknown`.
    pub fn condition(&self, t: ConditionType) -> ConditionStatus {
        self.conditions
            .iter()
            .find(|c| c.condition_type == t)
            .map_or(ConditionStatus::Unknown, |c| c.status)
    }

    pub fn is_established(&self) -> bool {
        self.condition(ConditionType::Established) == ConditionStatus::True
    }

    /// Reason text when the store explicitly refused the names.
    pub fn names_rejected(&self) -> Option<&str> {
        self.conditions
            .iter()
            .find(|c| {
                c.condition_type == ConditionType::NamesAccepted
                    && c.status == ConditionStatus::False
            })
            .map(|c| c.reason.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub metadata: ObjectMeta,
    pub spec: DescriptorSpec,
    pub status: DescriptorStatus,
}

impl ResourceDescriptor {
    /// Build with the identity key derived from `plural.group`.
    pub fn new(spec: DescriptorSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: identity_key(&spec.names.plural, &spec.group),
                ..Default::default()
            },
            spec,
            status: DescriptorStatus::default(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }
}

/// Store identity of a descriptor.
pub fn identity_key(plural: &str, group: &str) -> String {
    format!("{plural}.{group}")
}
