//! Integration tests for the discovery job state machine.

use cloudinv_core::error::InventoryError;
use cloudinv_core::models::discovery_job::{CreateDiscoveryJob, JobOutcome, JobStatus, JobTrigger};
use cloudinv_core::models::resource::ResourceKind;
use cloudinv_core::repository::DiscoveryJobRepository;
use cloudinv_db::repository::SurrealDiscoveryJobRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealDiscoveryJobRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cloudinv_db::run_migrations(&db).await.unwrap();
    SurrealDiscoveryJobRepository::new(db)
}

fn request(tenant_id: Uuid, start_running: bool) -> CreateDiscoveryJob {
    CreateDiscoveryJob {
        tenant_id,
        trigger: JobTrigger::Manual,
        requested_kinds: vec![ResourceKind::ComputeInstance, ResourceKind::ObjectStore],
        start_running,
    }
}

#[tokio::test]
async fn pending_job_moves_through_running_to_completed() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let job = repo.create(request(tenant_id, false)).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
    assert_eq!(
        job.requested_kinds,
        vec![ResourceKind::ComputeInstance, ResourceKind::ObjectStore]
    );

    let running = repo.mark_running(tenant_id, job.id).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert!(running.started_at.is_some());

    let done = repo
        .finalize(
            tenant_id,
            job.id,
            JobOutcome {
                requested_regions: vec!["us-east-1".into()],
                resources_created: 3,
                resources_updated: 1,
                resources_unchanged: 2,
                errors: Vec::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.resources_created, 3);
    assert_eq!(done.resources_updated, 1);
    assert_eq!(done.resources_unchanged, 2);
    assert_eq!(done.resources_seen(), 6);
    assert_eq!(done.requested_regions, vec!["us-east-1".to_string()]);
    assert!(done.error_message.is_none());
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn errors_finalize_as_failed_with_joined_message() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let job = repo.create(request(tenant_id, true)).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let failed = repo
        .finalize(
            tenant_id,
            job.id,
            JobOutcome {
                resources_created: 2,
                errors: vec![
                    "ComputeInstance/us-east-1: throttled".into(),
                    "ObjectStore/us-east-1: access denied".into(),
                ],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.resources_created, 2);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("ComputeInstance/us-east-1: throttled; ObjectStore/us-east-1: access denied")
    );
}

#[tokio::test]
async fn terminal_job_cannot_be_finalized_again() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let job = repo.create(request(tenant_id, true)).await.unwrap();
    repo.finalize(tenant_id, job.id, JobOutcome::default())
        .await
        .unwrap();

    let err = repo
        .finalize(tenant_id, job.id, JobOutcome::failed("late failure"))
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    let err = repo.mark_running(tenant_id, job.id).await.unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    let stored = repo.get_by_id(tenant_id, job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.error_message.is_none());
}

#[tokio::test]
async fn pending_job_cannot_skip_running() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let job = repo.create(request(tenant_id, false)).await.unwrap();
    let err = repo
        .finalize(tenant_id, job.id, JobOutcome::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));
}

#[tokio::test]
async fn pending_job_can_be_abandoned_once() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let job = repo.create(request(tenant_id, false)).await.unwrap();
    let abandoned = repo
        .abandon(tenant_id, job.id, "discovery could not start".into())
        .await
        .unwrap();
    assert_eq!(abandoned.status, JobStatus::Failed);
    assert_eq!(
        abandoned.error_message.as_deref(),
        Some("discovery could not start")
    );
    assert!(abandoned.started_at.is_none());
    assert!(abandoned.completed_at.is_some());

    let err = repo
        .abandon(tenant_id, job.id, "again".into())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    let running = repo.create(request(tenant_id, true)).await.unwrap();
    let err = repo
        .abandon(tenant_id, running.id, "too late".into())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));
}

#[tokio::test]
async fn unknown_or_foreign_job_is_not_found() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let err = repo
        .mark_running(tenant_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::NotFound { .. }));

    let job = repo.create(request(tenant_id, true)).await.unwrap();
    let err = repo.get_by_id(Uuid::new_v4(), job.id).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound { .. }));
}

#[tokio::test]
async fn list_returns_newest_first_within_limit() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let first = repo.create(request(tenant_id, true)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = repo.create(request(tenant_id, true)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let third = repo.create(request(tenant_id, true)).await.unwrap();

    repo.create(request(Uuid::new_v4(), true)).await.unwrap();

    let jobs = repo.list(tenant_id, 10).await.unwrap();
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let limited = repo.list(tenant_id, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, third.id);
}
