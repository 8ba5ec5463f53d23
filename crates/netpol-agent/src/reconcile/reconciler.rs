use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use netpol_core::error::{NetpolError, Result};

use crate::obs::AgentMetrics;
use crate::resource::{needs_update, RegistryEntry, ResourceDescriptor, SchemaVersion};
use crate::store::{ObjectStore, StoreOp};

use super::poll::{poll, Cancellation, PollConfig, Step};

/// What a successful reconciliation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// We created the descriptor.
    Created,
    /// Another writer created it first; we only waited for acceptance.
    CreateRaced,
    /// A stale descriptor was replaced.
    Updated,
    /// Already current; nothing written.
    Unchanged,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::CreateRaced => "create_raced",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converges the store's copy of a descriptor to the registry's.
///
/// Holds no lock over the store: a lost create race is benign, and every
/// update decision is made on a fresh read. Safe to run on every start and
/// concurrently for distinct kinds.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    poll: PollConfig,
    metrics: Arc<AgentMetrics>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, poll: PollConfig, metrics: Arc<AgentMetrics>) -> Self {
        Self {
            store,
            poll,
            metrics,
        }
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Install or upgrade `entry`'s descriptor and wait until the store has
    /// established it. Installs that never become established are rolled back.
    pub async fn reconcile(&self, entry: &RegistryEntry, cancel: &Cancellation) -> Result<Outcome> {
        let span = tracing::info_span!("reconcile", name = %entry.descriptor.name(), kind = %entry.kind);
        let kind = entry.kind.to_string();
        let started = Instant::now();

        let res = self
            .reconcile_inner(&entry.descriptor, &entry.schema_version, cancel)
            .instrument(span)
            .await;

        self.metrics
            .reconcile_duration
            .observe(&[("kind", kind.as_str())], started.elapsed());
        let outcome = match &res {
            Ok(o) => o.as_str(),
            Err(e) => e.code().as_str(),
        };
        self.metrics
            .reconcile_outcomes
            .inc(&[("kind", kind.as_str()), ("outcome", outcome)]);
        res
    }

    async fn reconcile_inner(
        &self,
        desired: &ResourceDescriptor,
        expected: &SchemaVersion,
        cancel: &Cancellation,
    ) -> Result<Outcome> {
        let name = desired.name();

        let outcome = match self.get(name).await? {
            None => {
                tracing::info!("creating descriptor");
                match self.create(desired).await {
                    Ok(_) => Outcome::Created,
                    // Another agent won the race and owns bringing it current.
                    Err(e) if e.is_already_exists() => {
                        tracing::info!("descriptor created concurrently by another writer");
                        Outcome::CreateRaced
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(observed) => {
                tracing::debug!("checking if descriptor needs update");
                if needs_update(&observed, expected) {
                    tracing::info!("updating descriptor");
                    if let Err(e) = self.update_until_current(desired, expected, cancel).await {
                        tracing::error!(error = %e, "unable to update descriptor");
                        return Err(e);
                    }
                    Outcome::Updated
                } else {
                    Outcome::Unchanged
                }
            }
        };

        tracing::debug!("waiting for descriptor to be established");
        if let Err(e) = self.wait_established(name, cancel).await {
            // A cancelled wait says nothing about a descriptor we did not write.
            if matches!(e, NetpolError::Cancelled(_))
                && matches!(outcome, Outcome::Unchanged | Outcome::CreateRaced)
            {
                tracing::info!(error = %e, "acceptance wait cancelled, leaving descriptor in place");
                return Err(e);
            }
            return Err(self.rollback(name, e).await);
        }

        tracing::info!(outcome = %outcome, "descriptor is installed and up-to-date");
        Ok(outcome)
    }

    /// Fetch, re-check, submit; repeated until current or the ceiling passes.
    async fn update_until_current(
        &self,
        desired: &ResourceDescriptor,
        expected: &SchemaVersion,
        cancel: &Cancellation,
    ) -> Result<()> {
        let name = desired.name();
        poll(&self.poll, cancel, "descriptor update", move || async move {
            let observed = match self.get(name).await {
                Ok(Some(o)) => o,
                // Deleted under us (e.g. a peer's rollback): submit it afresh.
                Ok(None) => {
                    return match self.create(desired).await {
                        Ok(_) => Step::Done(()),
                        Err(e) => Step::Retry(Some(e)),
                    }
                }
                Err(e) => return Step::Retry(Some(e)),
            };

            if !needs_update(&observed, expected) {
                return Step::Done(());
            }

            tracing::debug!("descriptor schema is stale, submitting replacement");
            let mut next = observed;
            next.metadata.labels = desired.metadata.labels.clone();
            next.spec = desired.spec.clone();
            match self.update(&next).await {
                Ok(_) => Step::Done(()),
                Err(e) => {
                    tracing::debug!(error = %e, "unable to update descriptor");
                    Step::Retry(Some(e))
                }
            }
        })
        .await
    }

    /// Established wins; a refused name fails at once.
    async fn wait_established(&self, name: &str, cancel: &Cancellation) -> Result<()> {
        poll(&self.poll, cancel, "descriptor to be established", move || async move {
            let observed = match self.get(name).await {
                Ok(Some(o)) => o,
                Ok(None) => return Step::Retry(Some(NetpolError::NotFound(name.to_string()))),
                Err(e) => return Step::Retry(Some(e)),
            };

            if observed.status.is_established() {
                return Step::Done(());
            }
            if let Some(reason) = observed.status.names_rejected() {
                tracing::error!(reason = %reason, "name conflict for descriptor");
                return Step::Fail(NetpolError::NameConflict {
                    name: name.to_string(),
                    reason: reason.to_string(),
                });
            }
            Step::Retry(None)
        })
        .await
    }

    /// Best-effort delete after a failed install. Never retried.
    async fn rollback(&self, name: &str, cause: NetpolError) -> NetpolError {
        match self.delete(name).await {
            Ok(()) => {
                tracing::warn!(error = %cause, "removed descriptor after failed install");
                cause
            }
            Err(delete) => {
                tracing::error!(error = %cause, delete_error = %delete, "unable to remove descriptor after failed install");
                NetpolError::Rollback {
                    name: name.to_string(),
                    cause: Box::new(cause),
                    delete: Box::new(delete),
                }
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Option<ResourceDescriptor>> {
        let res = self.store.get(name).await;
        self.record(StoreOp::Get, &res);
        res
    }

    async fn create(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        let res = self.store.create(desc).await;
        self.record(StoreOp::Create, &res);
        res
    }

    async fn update(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        let res = self.store.update(desc).await;
        self.record(StoreOp::Update, &res);
        res
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let res = self.store.delete(name).await;
        self.record(StoreOp::Delete, &res);
        res
    }

    fn record<T>(&self, op: StoreOp, res: &Result<T>) {
        let result = match res {
            Ok(_) => "ok",
            Err(e) => e.code().as_str(),
        };
        self.metrics
            .store_calls
            .inc(&[("op", op.as_str()), ("result", result)]);
    }
}
