//! In-process object store.
//!
//! Keeps descriptors in a `DashMap`, stamps resource versions, and answers
//! acceptance the way it is told to. Call counting and per-operation fault
//! injection make every reconciler path reachable without a cluster.

use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;

use netpol_core::error::{NetpolError, Result};

use crate::resource::{
    Condition, ConditionStatus, ConditionType, DescriptorStatus, ResourceDescriptor,
};

use super::ObjectStore;

/// How the store reports acceptance after a write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Acceptance {
    /// Names accepted and established right away.
    #[default]
    Immediate,
    /// Conditions stay unknown.
    Never,
    /// Names refused with the given reason.
    NameConflict(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Create,
    Update,
    Delete,
}

impl StoreOp {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreOp::Get => "get",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<String, ResourceDescriptor>,
    acceptance: RwLock<Acceptance>,
    calls: DashMap<StoreOp, u64>,
    faults: DashMap<StoreOp, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acceptance(self, acceptance: Acceptance) -> Self {
        self.set_acceptance(acceptance);
        self
    }

    pub fn set_acceptance(&self, acceptance: Acceptance) {
        if let Ok(mut g) = self.acceptance.write() {
            *g = acceptance;
        }
    }

    /// Seed an object as-is, bypassing counters and acceptance.
    pub fn insert(&self, desc: ResourceDescriptor) {
        self.objects.insert(desc.metadata.name.clone(), desc);
    }

    /// Drop an object as another writer would, bypassing counters.
    pub fn remove(&self, name: &str) -> Option<ResourceDescriptor> {
        self.objects.remove(name).map(|(_, d)| d)
    }

    /// Current stored copy, without counting a call.
    pub fn peek(&self, name: &str) -> Option<ResourceDescriptor> {
        self.objects.get(name).map(|r| r.value().clone())
    }

    pub fn set_status(&self, name: &str, status: DescriptorStatus) {
        if let Some(mut obj) = self.objects.get_mut(name) {
            obj.status = status;
        }
    }

    /// Make the next `n` calls of `op` fail with a transient store error.
    pub fn fail_next(&self, op: StoreOp, n: u32) {
        self.faults.insert(op, n);
    }

    pub fn calls(&self, op: StoreOp) -> u64 {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    /// Total of create + update + delete calls.
    pub fn writes(&self) -> u64 {
        self.calls(StoreOp::Create) + self.calls(StoreOp::Update) + self.calls(StoreOp::Delete)
    }

    pub fn reset_calls(&self) {
        self.calls.clear();
    }

    fn enter(&self, op: StoreOp) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        if let Some(mut left) = self.faults.get_mut(&op) {
            if *left > 0 {
                *left -= 1;
                return Err(NetpolError::Store(format!("injected {} failure", op.as_str())));
            }
        }
        Ok(())
    }

    fn accepted_status(&self) -> DescriptorStatus {
        let acceptance = self
            .acceptance
            .read()
            .map(|g| g.clone())
            .unwrap_or(Acceptance::Never);

        let conditions = match acceptance {
            Acceptance::Immediate => vec![
                Condition::new(ConditionType::NamesAccepted, ConditionStatus::True, "NoConflicts"),
                Condition::new(ConditionType::Established, ConditionStatus::True, "InitialNamesAccepted"),
            ],
            Acceptance::Never => Vec::new(),
            Acceptance::NameConflict(reason) => vec![
                Condition::new(ConditionType::NamesAccepted, ConditionStatus::False, reason),
                Condition::new(ConditionType::Established, ConditionStatus::False, "NotAccepted"),
            ],
        };
        DescriptorStatus { conditions }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<ResourceDescriptor>> {
        self.enter(StoreOp::Get)?;
        Ok(self.peek(name))
    }

    async fn create(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.enter(StoreOp::Create)?;
        let status = self.accepted_status();

        match self.objects.entry(desc.metadata.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(NetpolError::AlreadyExists(desc.metadata.name.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut stored = desc.clone();
                stored.metadata.resource_version = 1;
                stored.status = status;
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn update(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.enter(StoreOp::Update)?;
        let status = self.accepted_status();
        let name = &desc.metadata.name;

        let mut current = self
            .objects
            .get_mut(name)
            .ok_or_else(|| NetpolError::NotFound(name.clone()))?;
        if current.metadata.resource_version != desc.metadata.resource_version {
            return Err(NetpolError::Store(format!(
                "conflict updating {name}: the object has been modified"
            )));
        }

        let mut stored = desc.clone();
        stored.metadata.resource_version = current.metadata.resource_version + 1;
        stored.status = status;
        *current = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.enter(StoreOp::Delete)?;
        self.objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NetpolError::NotFound(name.to_string()))
    }
}
