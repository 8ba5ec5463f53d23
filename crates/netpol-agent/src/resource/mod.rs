//! Resource descriptors, schema versions, and the registry of managed kinds.

pub mod descriptor;
pub mod registry;
pub mod version;

pub use descriptor::{
    identity_key, Condition, ConditionStatus, ConditionType, DescriptorSpec, DescriptorStatus,
    ObjectMeta, PrinterColumn, ResourceDescriptor, ResourceNames, Scope, ValidationSchema,
};
pub use registry::{RegistryEntry, ResourceKind, SchemaRegistry, ValidationDocs};
pub use version::{needs_update, SchemaVersion, SCHEMA_VERSION_LABEL};
