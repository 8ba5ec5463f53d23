//! Shared application state for the agent.
//!
//! Owns the config, the read-only schema registry, the store handle and the
//! metrics, and runs the startup schema installation that must succeed before
//! any policy traffic is accepted.

use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;

use netpol_core::error::{NetpolError, Result};

use crate::config::{AgentConfig, IdentityAllocationMode};
use crate::obs::AgentMetrics;
use crate::reconcile::{Cancellation, Outcome, Reconciler};
use crate::resource::{ResourceKind, SchemaRegistry, ValidationDocs};
use crate::store::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: AgentConfig,
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn ObjectStore>,
    metrics: Arc<AgentMetrics>,
}

impl AppState {
    /// Build state with the built-in registry.
    pub fn new(cfg: AgentConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let registry = SchemaRegistry::builtin(&ValidationDocs::default()).map_err(|e| {
            NetpolError::Internal(format!("schema registry build failed: {e}"))
        })?;
        Ok(Self::with_registry(cfg, Arc::new(registry), store))
    }

    pub fn with_registry(
        cfg: AgentConfig,
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                store,
                metrics: Arc::new(AgentMetrics::default()),
            }),
        }
    }

    pub fn cfg(&self) -> &AgentConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn metrics(&self) -> Arc<AgentMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.inner.store),
            self.inner.cfg.reconcile.poll_config(),
            self.metrics(),
        )
    }

    /// Kinds this agent installs. Identities live in the kvstore when so configured.
    pub fn enabled_kinds(&self) -> Vec<ResourceKind> {
        self.inner
            .registry
            .entries()
            .map(|e| e.kind)
            .filter(|k| {
                *k != ResourceKind::Identity
                    || self.inner.cfg.resources.identity_allocation_mode
                        == IdentityAllocationMode::Crd
            })
            .collect()
    }

    /// Reconcile every enabled kind concurrently and wait for all of them.
    ///
    /// Each failure is logged; the first one (in kind order) fails startup.
    pub async fn install_schemas(
        &self,
        cancel: &Cancellation,
    ) -> Result<Vec<(ResourceKind, Outcome)>> {
        let reconciler = self.reconciler();
        let registry = &self.inner.registry;

        let mut futs = FuturesUnordered::new();
        for kind in self.enabled_kinds() {
            let entry = registry.entry(kind)?;
            let reconciler = &reconciler;
            futs.push(async move { (kind, reconciler.reconcile(entry, cancel).await) });
        }

        let mut done = Vec::new();
        let mut failed = Vec::new();
        while let Some((kind, res)) = futs.next().await {
            match res {
                Ok(outcome) => done.push((kind, outcome)),
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "schema installation failed");
                    failed.push((kind, e));
                }
            }
        }

        failed.sort_by_key(|(k, _)| *k);
        if let Some((_, e)) = failed.into_iter().next() {
            return Err(e);
        }

        done.sort_by_key(|(k, _)| *k);
        tracing::info!(count = done.len(), "all schemas installed");
        Ok(done)
    }
}
