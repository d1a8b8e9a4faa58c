//! End-to-end engine tests against a stateful in-memory catalog:
//! the classroom scenario, convergence on re-sync, per-organization
//! failure isolation, conflict skipping, and deadline handling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tessera_catalog_client::{CatalogApi, CatalogError, CatalogResult, Membership};
use tessera_core::{ClientId, GroupId, OrgId, Role, UserId};
use tessera_directory::{DirectoryModel, RolePrecedence};
use tessera_sync::{InMemoryAuditSink, OperationOutcome, SyncConfig, SyncEngine, SyncError};

// =============================================================================
// Stateful fake catalog
// =============================================================================

/// In-memory catalog that actually applies writes, so a second run
/// observes the state the first run produced.
#[derive(Default)]
struct FakeCatalog {
    orgs: RwLock<BTreeMap<OrgId, BTreeMap<UserId, Role>>>,
    /// Organizations whose reads fail.
    unreadable_orgs: BTreeSet<OrgId>,
    /// Delay applied to reads, to hold a run in flight.
    list_delay: Option<Duration>,
    list_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl FakeCatalog {
    fn new() -> Self {
        Self::default()
    }

    fn with_unreadable(orgs: &[&str]) -> Self {
        Self {
            unreadable_orgs: orgs.iter().map(|o| OrgId::new(*o)).collect(),
            ..Self::default()
        }
    }

    fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Self::default()
        }
    }

    async fn seed(&self, org: &str, user: UserId, capacity: &str) {
        self.orgs
            .write()
            .await
            .entry(OrgId::new(org))
            .or_default()
            .insert(user, Role::new(capacity));
    }

    async fn capacity_of(&self, org: &str, user: UserId) -> Option<Role> {
        self.orgs
            .read()
            .await
            .get(&OrgId::new(org))
            .and_then(|members| members.get(&user).cloned())
    }

    async fn member_count(&self, org: &str) -> usize {
        self.orgs
            .read()
            .await
            .get(&OrgId::new(org))
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_members(&self, org: &OrgId) -> CatalogResult<Vec<Membership>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreadable_orgs.contains(org) {
            return Err(CatalogError::Api {
                status: 503,
                message: "catalog shard down".to_string(),
            });
        }
        Ok(self
            .orgs
            .read()
            .await
            .get(org)
            .map(|members| {
                members
                    .iter()
                    .map(|(user, capacity)| Membership {
                        user: *user,
                        capacity: capacity.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.orgs
            .write()
            .await
            .entry(org.clone())
            .or_default()
            .insert(user, capacity.clone());
        Ok(Membership {
            user,
            capacity: capacity.clone(),
        })
    }

    async fn update_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut orgs = self.orgs.write().await;
        let members = orgs.entry(org.clone()).or_default();
        if !members.contains_key(&user) {
            return Err(CatalogError::NotFound {
                resource: format!("member {user}"),
            });
        }
        members.insert(user, capacity.clone());
        Ok(Membership {
            user,
            capacity: capacity.clone(),
        })
    }

    async fn remove_member(&self, org: &OrgId, user: UserId) -> CatalogResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut orgs = self.orgs.write().await;
        let removed = orgs
            .get_mut(org)
            .and_then(|members| members.remove(&user));
        if removed.is_none() {
            return Err(CatalogError::NotFound {
                resource: format!("member {user}"),
            });
        }
        Ok(())
    }
}

/// Wrapper that fails every capacity update, simulating a member removed
/// out-of-band between fetch and apply.
struct UpdateFailsCatalog {
    inner: Arc<FakeCatalog>,
}

#[async_trait]
impl CatalogApi for UpdateFailsCatalog {
    async fn list_members(&self, org: &OrgId) -> CatalogResult<Vec<Membership>> {
        self.inner.list_members(org).await
    }

    async fn add_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership> {
        self.inner.add_member(org, user, capacity).await
    }

    async fn update_member(
        &self,
        _org: &OrgId,
        _user: UserId,
        _capacity: &Role,
    ) -> CatalogResult<Membership> {
        Err(CatalogError::NotFound {
            resource: "member vanished".to_string(),
        })
    }

    async fn remove_member(&self, org: &OrgId, user: UserId) -> CatalogResult<()> {
        self.inner.remove_member(org, user).await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Classroom {
    model: DirectoryModel,
    config: SyncConfig,
    alice: UserId,
}

/// Client "c1" -> group "classroom-a" (editor) -> subgroup "project-alpha"
/// (publisher); alice is a member of the subgroup only; publisher > editor.
fn classroom() -> Classroom {
    let client = ClientId::new();
    let top = GroupId::new();
    let sub = GroupId::new();
    let alice = UserId::new();

    let mut model = DirectoryModel::new();
    model.add_client(client, "c1").unwrap();
    model.add_group(top, "classroom-a", client, None).unwrap();
    model.add_group(sub, "project-alpha", client, Some(top)).unwrap();
    model.assign_role(top, Role::new("editor")).unwrap();
    model.assign_role(sub, Role::new("publisher")).unwrap();
    model.add_user_membership(alice, sub).unwrap();

    let mut org_map = HashMap::new();
    org_map.insert(client, OrgId::new("c1-org"));
    let precedence = RolePrecedence::from_chains(vec![vec![
        Role::new("publisher"),
        Role::new("editor"),
        Role::new("member"),
    ]])
    .unwrap();

    let mut config = SyncConfig::new(org_map, precedence);
    // Single attempt keeps failure tests fast; retry behavior is covered
    // at the client level.
    config.retry.max_attempts = 1;
    config.retry.base_delay_secs = 0;
    config.requests_per_minute = 60_000;

    Classroom {
        model,
        config,
        alice,
    }
}

fn engine_with(
    catalog: Arc<dyn CatalogApi>,
    config: SyncConfig,
) -> (SyncEngine, Arc<InMemoryAuditSink>) {
    let sink = Arc::new(InMemoryAuditSink::new());
    let engine = SyncEngine::new(catalog, sink.clone(), config);
    (engine, sink)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_subgroup_member_granted_highest_capacity() {
    let fixture = classroom();
    let catalog = Arc::new(FakeCatalog::new());
    let (engine, _sink) = engine_with(catalog.clone(), fixture.config);

    let summary = engine.run(&fixture.model).await.unwrap();

    assert_eq!(summary.granted, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.conflicts.is_empty());
    // Effective roles {editor, publisher}; publisher wins.
    assert_eq!(
        catalog.capacity_of("c1-org", fixture.alice).await,
        Some(Role::new("publisher"))
    );
}

#[tokio::test]
async fn test_stale_capacity_is_updated_in_place() {
    let fixture = classroom();
    let catalog = Arc::new(FakeCatalog::new());
    catalog.seed("c1-org", fixture.alice, "editor").await;
    let (engine, _sink) = engine_with(catalog.clone(), fixture.config);

    let summary = engine.run(&fixture.model).await.unwrap();

    // Exactly one update, no grant/revoke churn.
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.granted, 0);
    assert_eq!(summary.revoked, 0);
    assert_eq!(
        catalog.capacity_of("c1-org", fixture.alice).await,
        Some(Role::new("publisher"))
    );
}

#[tokio::test]
async fn test_resync_converges_to_empty_diff() {
    let fixture = classroom();
    let catalog = Arc::new(FakeCatalog::new());
    let (engine, _sink) = engine_with(catalog.clone(), fixture.config);

    let first = engine.run(&fixture.model).await.unwrap();
    assert_eq!(first.granted, 1);

    let writes_after_first = catalog.write_calls.load(Ordering::SeqCst);
    let second = engine.run(&fixture.model).await.unwrap();

    // Second run observes the state the first produced: nothing to do.
    assert_eq!(second.granted + second.updated + second.revoked, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(catalog.write_calls.load(Ordering::SeqCst), writes_after_first);
}

#[tokio::test]
async fn test_member_without_directory_backing_is_revoked() {
    let fixture = classroom();
    let stale_user = UserId::new();
    let catalog = Arc::new(FakeCatalog::new());
    catalog.seed("c1-org", stale_user, "admin").await;
    let (engine, _sink) = engine_with(catalog.clone(), fixture.config);

    let summary = engine.run(&fixture.model).await.unwrap();

    assert_eq!(summary.granted, 1); // alice
    assert_eq!(summary.revoked, 1); // stale_user
    assert_eq!(catalog.capacity_of("c1-org", stale_user).await, None);
    assert_eq!(catalog.member_count("c1-org").await, 1);
}

#[tokio::test]
async fn test_fetch_failure_isolated_to_one_org() {
    // Two clients; org-down cannot be read, org-up must still sync.
    let client_up = ClientId::new();
    let client_down = ClientId::new();
    let group_up = GroupId::new();
    let group_down = GroupId::new();
    let alice = UserId::new();
    let bob = UserId::new();

    let mut model = DirectoryModel::new();
    model.add_client(client_up, "up").unwrap();
    model.add_client(client_down, "down").unwrap();
    model.add_group(group_up, "g-up", client_up, None).unwrap();
    model.add_group(group_down, "g-down", client_down, None).unwrap();
    model.assign_role(group_up, Role::new("editor")).unwrap();
    model.assign_role(group_down, Role::new("editor")).unwrap();
    model.add_user_membership(alice, group_up).unwrap();
    model.add_user_membership(bob, group_down).unwrap();

    let mut org_map = HashMap::new();
    org_map.insert(client_up, OrgId::new("org-up"));
    org_map.insert(client_down, OrgId::new("org-down"));
    let mut config = SyncConfig::new(org_map, RolePrecedence::empty());
    config.retry.max_attempts = 1;
    config.retry.base_delay_secs = 0;
    config.requests_per_minute = 60_000;

    let catalog = Arc::new(FakeCatalog::with_unreadable(&["org-down"]));
    let (engine, _sink) = engine_with(catalog.clone(), config);

    let summary = engine.run(&model).await.unwrap();

    // org-up synced; org-down reported, untouched.
    assert_eq!(summary.granted, 1);
    assert_eq!(summary.fetch_errors.len(), 1);
    assert_eq!(summary.fetch_errors[0].org, OrgId::new("org-down"));
    assert_eq!(
        catalog.capacity_of("org-up", alice).await,
        Some(Role::new("editor"))
    );
    assert_eq!(catalog.member_count("org-down").await, 0);
}

#[tokio::test]
async fn test_incomparable_roles_reported_and_not_written() {
    let fixture = classroom();
    // Drop the precedence declaration: editor and publisher become
    // incomparable for alice.
    let mut config = fixture.config;
    config.precedence = RolePrecedence::empty();

    let catalog = Arc::new(FakeCatalog::new());
    let (engine, sink) = engine_with(catalog.clone(), config);

    let summary = engine.run(&fixture.model).await.unwrap();

    assert_eq!(summary.granted, 0);
    assert_eq!(summary.conflicts.len(), 1);
    let conflict = &summary.conflicts[0];
    assert_eq!(conflict.user, fixture.alice);
    assert_eq!(conflict.first, Role::new("editor"));
    assert_eq!(conflict.second, Role::new("publisher"));
    // Nothing was written for the conflicted pair.
    assert_eq!(catalog.member_count("c1-org").await, 0);

    // The conflict is on the audit record too.
    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conflicts.len(), 1);
}

#[tokio::test]
async fn test_second_concurrent_run_rejected() {
    let fixture = classroom();
    let catalog = Arc::new(FakeCatalog::with_list_delay(Duration::from_millis(300)));
    let (engine, _sink) = engine_with(catalog, fixture.config);
    let engine = Arc::new(engine);
    let model = Arc::new(fixture.model);

    let first = {
        let engine = engine.clone();
        let model = model.clone();
        tokio::spawn(async move { engine.run(&model).await })
    };

    // Give the first run time to claim the engine and block in fetch.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = engine.run(&model).await;
    assert!(matches!(second, Err(SyncError::AlreadyRunning)));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.granted, 1);

    // Once the first run finished, the engine accepts runs again.
    let third = engine.run(&model).await.unwrap();
    assert_eq!(third.granted + third.updated + third.revoked, 0);
}

#[tokio::test]
async fn test_expired_deadline_reports_skipped() {
    let fixture = classroom();
    let mut config = fixture.config;
    config.run_deadline_secs = Some(0);

    let catalog = Arc::new(FakeCatalog::new());
    let (engine, _sink) = engine_with(catalog.clone(), config);

    let summary = engine.run(&fixture.model).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.granted, 0);
    assert_eq!(catalog.member_count("c1-org").await, 0);
}

#[tokio::test]
async fn test_audit_record_answers_why() {
    let fixture = classroom();
    let catalog: Arc<FakeCatalog> = Arc::new(FakeCatalog::new());
    let (engine, sink) = engine_with(catalog, fixture.config);

    let summary = engine.run(&fixture.model).await.unwrap();

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.run_id, summary.run_id);
    assert_eq!(record.operations.len(), 1);
    assert_eq!(record.results.len(), 1);

    // The record retains the full effective role set behind the written
    // capacity.
    let assignment = &record.assignments[0];
    assert_eq!(assignment.user, fixture.alice);
    assert_eq!(assignment.capacity, Role::new("publisher"));
    assert!(assignment.roles.contains(&Role::new("editor")));
    assert!(assignment.roles.contains(&Role::new("publisher")));
}

#[tokio::test]
async fn test_operation_failure_reported_not_fatal() {
    // The fetch sees alice at "editor", but the member vanishes before the
    // capacity update lands: the operation fails, the run does not.
    let fixture = classroom();
    let inner = Arc::new(FakeCatalog::new());
    inner.seed("c1-org", fixture.alice, "editor").await;
    let catalog = Arc::new(UpdateFailsCatalog { inner });

    let (engine, sink) = engine_with(catalog, fixture.config);
    let summary = engine.run(&fixture.model).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.granted + summary.updated + summary.revoked, 0);
    assert_eq!(summary.failures.len(), 1);
    match &summary.failures[0].outcome {
        OperationOutcome::Failed { error_code, .. } => {
            assert_eq!(error_code, "NOT_FOUND");
        }
        other => panic!("Expected Failed, got: {other:?}"),
    }

    // The failed operation is on the audit record as well.
    let records = sink.records().await;
    assert_eq!(records[0].counts.failed, 1);
}

#[tokio::test]
async fn test_cancel_between_runs_does_not_poison_next_run() {
    let fixture = classroom();
    let catalog = Arc::new(FakeCatalog::new());
    let (engine, _sink) = engine_with(catalog.clone(), fixture.config);

    let summary = engine.run(&fixture.model).await.unwrap();
    assert_eq!(summary.granted, 1);

    // The cancel flag is reset when the next run starts.
    engine.cancel();
    let summary = engine.run(&fixture.model).await.unwrap();
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
}
