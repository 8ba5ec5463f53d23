//! Schema lifecycle reconciler against the in-memory store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use netpol_agent::obs::AgentMetrics;
use netpol_agent::reconcile::{Cancellation, Outcome, PollConfig, Reconciler};
use netpol_agent::resource::{
    needs_update, RegistryEntry, ResourceDescriptor, ResourceKind, SchemaRegistry,
    SchemaVersion, ValidationDocs, SCHEMA_VERSION_LABEL,
};
use netpol_agent::store::{Acceptance, MemoryStore, ObjectStore, StoreOp};
use netpol_core::error::Result;

fn fast() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(2),
        timeout: Duration::from_millis(200),
    }
}

fn slow() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(30),
    }
}

fn policy_entry() -> RegistryEntry {
    let reg = SchemaRegistry::builtin(&ValidationDocs::default()).unwrap();
    reg.entry(ResourceKind::NetworkPolicy).unwrap().clone()
}

fn reconciler(store: Arc<dyn ObjectStore>, poll: PollConfig) -> (Reconciler, Arc<AgentMetrics>) {
    let metrics = Arc::new(AgentMetrics::default());
    (Reconciler::new(store, poll, Arc::clone(&metrics)), metrics)
}

/// Stored copy of `entry` with its version label replaced (or removed).
fn stored_with_label(entry: &RegistryEntry, label: Option<&str>) -> ResourceDescriptor {
    let mut d = entry.descriptor.clone();
    d.metadata.labels.remove(SCHEMA_VERSION_LABEL);
    if let Some(l) = label {
        d.metadata.labels.insert(SCHEMA_VERSION_LABEL.into(), l.into());
    }
    d.metadata.resource_version = 7;
    d
}

#[test]
fn version_comparison() {
    let entry = policy_entry();
    let expected = SchemaVersion::parse("1.15").unwrap();

    assert!(needs_update(&stored_with_label(&entry, Some("1.14")), &expected));
    assert!(!needs_update(&stored_with_label(&entry, Some("1.15")), &expected));
    assert!(!needs_update(&stored_with_label(&entry, Some("1.16.1")), &expected));
    assert!(needs_update(&stored_with_label(&entry, Some("abc")), &expected));
    assert!(needs_update(&stored_with_label(&entry, None), &expected));

    let mut no_schema = stored_with_label(&entry, Some("1.15"));
    no_schema.spec.validation = None;
    assert!(needs_update(&no_schema, &expected));
}

#[tokio::test]
async fn creates_when_absent() {
    let store = Arc::new(MemoryStore::new());
    let (r, metrics) = reconciler(store.clone(), fast());
    let entry = policy_entry();

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Created);
    assert_eq!(store.calls(StoreOp::Create), 1);
    let stored = store.peek("networkpolicies.netpol.io").unwrap();
    assert_eq!(stored.label(SCHEMA_VERSION_LABEL), Some("1.15.0"));
    assert!(stored.status.is_established());
    assert_eq!(
        metrics.reconcile_outcomes.get(&[("kind", "NetworkPolicy/v2"), ("outcome", "created")]),
        1
    );
}

#[tokio::test]
async fn second_run_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let (r, _) = reconciler(store.clone(), fast());
    let entry = policy_entry();

    r.reconcile(&entry, &Cancellation::never()).await.unwrap();
    store.reset_calls();
    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn stale_version_is_updated() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    store.insert(stored_with_label(&entry, Some("1.14")));
    let (r, _) = reconciler(store.clone(), fast());

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(store.calls(StoreOp::Update), 1);
    assert_eq!(store.calls(StoreOp::Create), 0);
    let stored = store.peek(entry.descriptor.name()).unwrap();
    assert_eq!(stored.label(SCHEMA_VERSION_LABEL), Some("1.15.0"));
    assert_eq!(stored.spec, entry.descriptor.spec);
    assert_eq!(stored.metadata.resource_version, 8);
}

#[tokio::test]
async fn unparsable_version_is_updated() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    store.insert(stored_with_label(&entry, Some("abc")));
    let (r, _) = reconciler(store.clone(), fast());

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();
    assert_eq!(outcome, Outcome::Updated);
}

#[tokio::test]
async fn newer_version_is_left_alone() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    let mut newer = stored_with_label(&entry, Some("1.20"));
    newer.status = netpol_agent::resource::DescriptorStatus {
        conditions: vec![netpol_agent::resource::Condition::new(
            netpol_agent::resource::ConditionType::Established,
            netpol_agent::resource::ConditionStatus::True,
            "",
        )],
    };
    store.insert(newer);
    let (r, _) = reconciler(store.clone(), fast());

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(store.writes(), 0);
    assert_eq!(
        store.peek(entry.descriptor.name()).unwrap().label(SCHEMA_VERSION_LABEL),
        Some("1.20")
    );
}

#[tokio::test]
async fn update_retries_transient_failures() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    store.insert(stored_with_label(&entry, Some("1.14")));
    store.fail_next(StoreOp::Update, 2);
    let (r, _) = reconciler(store.clone(), fast());

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(store.calls(StoreOp::Update), 3);
}

#[tokio::test]
async fn update_ceiling_propagates_last_error() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    store.insert(stored_with_label(&entry, Some("1.14")));
    store.fail_next(StoreOp::Update, u32::MAX);
    let (r, _) = reconciler(store.clone(), fast());

    let err = r.reconcile(&entry, &Cancellation::never()).await.unwrap_err();

    assert_eq!(err.code().as_str(), "TIMEOUT");
    assert!(err.to_string().contains("injected update failure"), "{err}");
    // the stale copy stays; only acceptance failures roll back
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert!(store.peek(entry.descriptor.name()).is_some());
}

#[tokio::test]
async fn initial_fetch_failure_is_returned() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next(StoreOp::Get, 1);
    let (r, _) = reconciler(store.clone(), fast());

    let err = r.reconcile(&policy_entry(), &Cancellation::never()).await.unwrap_err();
    assert_eq!(err.code().as_str(), "STORE");
    assert_eq!(store.writes(), 0);
}

/// Reports the descriptor absent on its first read, as a racing peer would see it.
struct StaleFirstRead {
    inner: Arc<MemoryStore>,
    used: AtomicBool,
}

#[async_trait]
impl ObjectStore for StaleFirstRead {
    async fn get(&self, name: &str) -> Result<Option<ResourceDescriptor>> {
        if !self.used.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get(name).await
    }
    async fn create(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.inner.create(desc).await
    }
    async fn update(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.inner.update(desc).await
    }
    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }
}

#[tokio::test]
async fn lost_create_race_is_success() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();

    let (first, _) = reconciler(store.clone(), fast());
    assert_eq!(first.reconcile(&entry, &Cancellation::never()).await.unwrap(), Outcome::Created);

    let racing = Arc::new(StaleFirstRead {
        inner: store.clone(),
        used: AtomicBool::new(false),
    });
    let (second, _) = reconciler(racing, fast());
    let outcome = second.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::CreateRaced);
    assert_eq!(store.calls(StoreOp::Create), 2);
    assert!(store.peek(entry.descriptor.name()).is_some());
}

#[tokio::test]
async fn concurrent_reconcilers_both_succeed() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    let (a, _) = reconciler(store.clone(), fast());
    let (b, _) = reconciler(store.clone(), fast());
    let cancel = Cancellation::never();

    let (ra, rb) = tokio::join!(a.reconcile(&entry, &cancel), b.reconcile(&entry, &cancel));

    let outcomes = [ra.unwrap(), rb.unwrap()];
    assert!(outcomes.contains(&Outcome::Created));
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert!(store.peek(entry.descriptor.name()).is_some());
}

#[tokio::test]
async fn name_conflict_fails_fast_and_rolls_back() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::NameConflict("conflict".into())));
    let (r, _) = reconciler(store.clone(), slow());
    let entry = policy_entry();

    let started = Instant::now();
    let err = r.reconcile(&entry, &Cancellation::never()).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.code().as_str(), "NAME_CONFLICT");
    assert!(err.to_string().contains("conflict"));
    assert_eq!(store.calls(StoreOp::Delete), 1);
    assert!(store.peek(entry.descriptor.name()).is_none());
}

#[tokio::test]
async fn never_established_times_out_and_rolls_back() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::Never));
    let (r, _) = reconciler(store.clone(), fast());
    let entry = policy_entry();

    let err = r.reconcile(&entry, &Cancellation::never()).await.unwrap_err();

    assert_eq!(err.code().as_str(), "TIMEOUT");
    assert!(store.peek(entry.descriptor.name()).is_none());
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::Never));
    store.fail_next(StoreOp::Delete, 1);
    let (r, _) = reconciler(store.clone(), fast());
    let entry = policy_entry();

    let err = r.reconcile(&entry, &Cancellation::never()).await.unwrap_err();

    assert_eq!(err.code().as_str(), "ROLLBACK");
    let msg = err.to_string();
    assert!(msg.contains("timed out"), "{msg}");
    assert!(msg.contains("injected delete failure"), "{msg}");
    assert_eq!(store.calls(StoreOp::Delete), 1);
}

#[tokio::test]
async fn cancellation_surfaces_as_cancelled() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::Never));
    let (r, _) = reconciler(store.clone(), slow());
    let entry = policy_entry();
    let (handle, cancel) = Cancellation::channel();

    let started = Instant::now();
    let run = r.reconcile(&entry, &cancel);
    let fire = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    };
    let (res, _) = tokio::join!(run, fire);

    let err = res.unwrap_err();
    assert_eq!(err.code().as_str(), "CANCELLED");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn established_later_is_accepted() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::Never));
    let (r, _) = reconciler(store.clone(), slow());
    let entry = policy_entry();
    let name = entry.descriptor.name().to_string();

    let never = Cancellation::never();
    let run = r.reconcile(&entry, &never);
    let accept = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.set_status(
            &name,
            netpol_agent::resource::DescriptorStatus {
                conditions: vec![netpol_agent::resource::Condition::new(
                    netpol_agent::resource::ConditionType::Established,
                    netpol_agent::resource::ConditionStatus::True,
                    "InitialNamesAccepted",
                )],
            },
        );
    };
    let (res, _) = tokio::join!(run, accept);

    assert_eq!(res.unwrap(), Outcome::Created);
    assert_eq!(store.calls(StoreOp::Delete), 0);
}

#[tokio::test]
async fn cancelled_rerun_keeps_converged_descriptor() {
    let store = Arc::new(MemoryStore::new());
    let (r, _) = reconciler(store.clone(), fast());
    let entry = policy_entry();
    r.reconcile(&entry, &Cancellation::never()).await.unwrap();
    store.reset_calls();

    let (handle, cancel) = Cancellation::channel();
    handle.cancel();
    let err = r.reconcile(&entry, &cancel).await.unwrap_err();

    assert_eq!(err.code().as_str(), "CANCELLED");
    assert_eq!(store.writes(), 0);
    assert!(store.peek(entry.descriptor.name()).is_some());
}

#[tokio::test]
async fn acceptance_wait_survives_transient_reads() {
    let store = Arc::new(MemoryStore::new().with_acceptance(Acceptance::Never));
    let (r, _) = reconciler(store.clone(), slow());
    let entry = policy_entry();
    let name = entry.descriptor.name().to_string();

    let never = Cancellation::never();
    let run = r.reconcile(&entry, &never);
    let flaky = async {
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.fail_next(StoreOp::Get, 3);
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.set_status(
            &name,
            netpol_agent::resource::DescriptorStatus {
                conditions: vec![netpol_agent::resource::Condition::new(
                    netpol_agent::resource::ConditionType::Established,
                    netpol_agent::resource::ConditionStatus::True,
                    "InitialNamesAccepted",
                )],
            },
        );
    };
    let (res, _) = tokio::join!(run, flaky);

    assert_eq!(res.unwrap(), Outcome::Created);
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert!(store.peek(&name).is_some());
}

/// Removes the descriptor right before the second read, like a peer's rollback.
struct VanishingOnReread {
    inner: Arc<MemoryStore>,
    reads: AtomicU32,
}

#[async_trait]
impl ObjectStore for VanishingOnReread {
    async fn get(&self, name: &str) -> Result<Option<ResourceDescriptor>> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            self.inner.remove(name);
        }
        self.inner.get(name).await
    }
    async fn create(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.inner.create(desc).await
    }
    async fn update(&self, desc: &ResourceDescriptor) -> Result<ResourceDescriptor> {
        self.inner.update(desc).await
    }
    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }
}

#[tokio::test]
async fn descriptor_deleted_during_update_is_recreated() {
    let store = Arc::new(MemoryStore::new());
    let entry = policy_entry();
    store.insert(stored_with_label(&entry, Some("1.14")));
    let vanishing = Arc::new(VanishingOnReread {
        inner: store.clone(),
        reads: AtomicU32::new(0),
    });
    let (r, _) = reconciler(vanishing, fast());

    let outcome = r.reconcile(&entry, &Cancellation::never()).await.unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(store.calls(StoreOp::Update), 0);
    assert_eq!(store.calls(StoreOp::Create), 1);
    let stored = store.peek(entry.descriptor.name()).unwrap();
    assert_eq!(stored.label(SCHEMA_VERSION_LABEL), Some("1.15.0"));
    assert_eq!(stored.metadata.resource_version, 1);
}
