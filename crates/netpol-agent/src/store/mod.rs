//! Object store collaborator contract.
//!
//! The reconciler needs exactly four operations keyed by the descriptor's
//! identity (`plural.group`). Status conditions travel on the fetched
//! descriptor. Implementations report a lost create race as
//! `NetpolError::AlreadyExists` and everything transient as `NetpolError::Store`.

pub mod memory;

use async_trait::async_trait;

use netpol_core::error::Result;

use crate::resource::ResourceDescriptor;

pub use memory::{Acceptance, MemoryStore, StoreOp};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when the descriptor does not exist.
    async fn get(&self, name: &str) -> Result<Option<ResourceDescriptor>>;

    /// Fails with `AlreadyExists` if another writer got there first.
    async fn create(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor>;

    /// Replace the stored object. `desc.metadata.resource_version` must match.
    async fn update(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor>;

    async fn delete(&self, name: &str) -> Result<()>;
}
