//! Integration tests for bulk tag remediation.

use std::collections::BTreeMap;
use std::sync::Arc;

use cloudinv_core::error::InventoryError;
use cloudinv_core::models::discovery_job::{JobStatus, JobTrigger};
use cloudinv_core::models::resource::{CloudResource, ResourceKind, Tags};
use cloudinv_db::repository::{
    SurrealDiscoveryJobRepository, SurrealResourceRepository, SurrealTagPolicyRepository,
};
use cloudinv_engine::{EngineConfig, InventoryService};
use cloudinv_provider::api::{RawDbInstance, RawInstance, RawTag};
use cloudinv_provider::memory::{BucketFixture, Fault};
use cloudinv_provider::{
    CredentialResolver, InMemoryClientFactory, InMemoryCloud, ProviderCredentials,
    StaticCredentialStore,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

const ACCOUNT: &str = "123456789012";
const EAST: &str = "us-east-1";
const WEST: &str = "eu-west-1";

type Service = InventoryService<
    SurrealResourceRepository<Db>,
    SurrealDiscoveryJobRepository<Db>,
    SurrealTagPolicyRepository<Db>,
>;

struct Fixture {
    cloud: InMemoryCloud,
    tenant_id: Uuid,
    svc: Service,
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn owner_tag() -> Vec<RawTag> {
    vec![RawTag::new("Owner", "a")]
}

fn instance(id: &str) -> RawInstance {
    RawInstance {
        instance_id: id.into(),
        instance_type: "t3.small".into(),
        state: "running".into(),
        platform: None,
        public_ip: None,
        private_ip: None,
        vpc_id: None,
        launch_time: None,
        volume_ids: Vec::new(),
        tags: owner_tag(),
    }
}

fn database(identifier: &str) -> RawDbInstance {
    RawDbInstance {
        identifier: identifier.into(),
        arn: format!("arn:aws:rds:{EAST}:{ACCOUNT}:db:{identifier}"),
        engine: "postgres".into(),
        engine_version: Some("16.2".into()),
        instance_class: "db.t3.micro".into(),
        status: "available".into(),
        allocated_storage_gb: Some(20),
        multi_az: false,
        storage_encrypted: Some(true),
        publicly_accessible: false,
        backup_retention_days: 7,
    }
}

/// Three instances in the east, one in the west, a database and a
/// bucket, all tagged `Owner=a`, discovered into the store.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cloudinv_db::run_migrations(&db).await.unwrap();

    let cloud = InMemoryCloud::new();
    for id in ["i-1", "i-2", "i-3"] {
        cloud.add_instance(EAST, instance(id));
    }
    cloud.add_instance(WEST, instance("i-4"));
    cloud.add_database(EAST, database("orders"), owner_tag());
    let mut bucket = BucketFixture::new("exports", EAST);
    bucket.tags = owner_tag();
    cloud.add_bucket(bucket);

    let tenant_id = Uuid::new_v4();
    let store = StaticCredentialStore::new().with(
        tenant_id,
        ProviderCredentials {
            access_key_id: "AKIATEST".into(),
            secret_access_key: "secret".into(),
            session_token: None,
            account_id: ACCOUNT.into(),
            regions: vec![EAST.into(), WEST.into()],
        },
    );
    let resolver = CredentialResolver::new(
        Arc::new(store),
        Arc::new(InMemoryClientFactory::new().with_account(ACCOUNT, cloud.clone())),
    );

    let svc = InventoryService::new(
        SurrealResourceRepository::new(db.clone()),
        SurrealDiscoveryJobRepository::new(db.clone()),
        SurrealTagPolicyRepository::new(db.clone()),
        resolver,
        EngineConfig::default(),
    );

    let job = svc.run_discovery(tenant_id, JobTrigger::Manual).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.resources_created, 6);

    Fixture {
        cloud,
        tenant_id,
        svc,
    }
}

impl Fixture {
    async fn resources(&self) -> BTreeMap<String, CloudResource> {
        self.svc
            .list_resources(self.tenant_id, Default::default(), Default::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|r| (r.short_id.clone(), r))
            .collect()
    }

    async fn ids(&self, short_ids: &[&str]) -> Vec<Uuid> {
        let all = self.resources().await;
        short_ids.iter().map(|s| all[*s].id).collect()
    }
}

#[tokio::test]
async fn tags_are_merged_not_overwritten() {
    let fx = setup().await;
    let ids = fx.ids(&["i-1", "orders", "exports"]).await;

    let report = fx
        .svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Team", "b")]))
        .await
        .unwrap();
    assert_eq!(report.success, 3);
    assert_eq!(report.failed, 0);
    assert!(report.errors.is_empty());

    let expected = tags(&[("Owner", "a"), ("Team", "b")]);
    assert_eq!(fx.cloud.instance_tags("i-1").unwrap(), expected);
    assert_eq!(
        fx.cloud
            .database_tags(&format!("arn:aws:rds:{EAST}:{ACCOUNT}:db:orders"))
            .unwrap(),
        expected
    );
    assert_eq!(fx.cloud.bucket_tags("exports").unwrap(), expected);

    let stored = fx.resources().await;
    for short in ["i-1", "orders", "exports"] {
        assert_eq!(stored[short].tags, expected, "{short}");
    }
    assert_eq!(stored["i-2"].tags, tags(&[("Owner", "a")]), "untouched");
}

#[tokio::test]
async fn new_values_win_over_existing_ones() {
    let fx = setup().await;
    let ids = fx.ids(&["exports"]).await;

    fx.svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Owner", "platform")]))
        .await
        .unwrap();

    assert_eq!(
        fx.cloud.bucket_tags("exports").unwrap(),
        tags(&[("Owner", "platform")])
    );
}

#[tokio::test]
async fn batch_kinds_get_one_call_per_region() {
    let fx = setup().await;
    let ids = fx.ids(&["i-1", "i-2", "i-3", "i-4"]).await;

    let report = fx
        .svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Env", "prod")]))
        .await
        .unwrap();
    assert_eq!(report.success, 4);

    let calls: Vec<_> = fx
        .cloud
        .tag_calls()
        .into_iter()
        .filter(|c| c.service == "ec2")
        .collect();
    assert_eq!(calls.len(), 2);
    let east = calls.iter().find(|c| c.region == EAST).unwrap();
    let west = calls.iter().find(|c| c.region == WEST).unwrap();
    assert_eq!(east.ids.len(), 3);
    assert_eq!(west.ids, vec!["i-4".to_string()]);
}

#[tokio::test]
async fn failed_group_does_not_stop_the_rest() {
    let fx = setup().await;
    fx.cloud.fail_tagging_for("i-2");
    let ids = fx.ids(&["i-1", "i-2", "i-3", "i-4", "exports"]).await;

    let report = fx
        .svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Team", "b")]))
        .await
        .unwrap();

    // The whole east batch fails; the west instance and bucket succeed.
    assert_eq!(report.failed, 3);
    assert_eq!(report.success, 2);
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.kind, Some(ResourceKind::ComputeInstance));
    assert_eq!(error.region.as_deref(), Some(EAST));
    assert!(error.error.contains("i-2"), "{}", error.error);

    let stored = fx.resources().await;
    assert_eq!(stored["i-1"].tags, tags(&[("Owner", "a")]));
    assert_eq!(stored["i-4"].tags, tags(&[("Owner", "a"), ("Team", "b")]));
}

#[tokio::test]
async fn per_resource_failures_are_isolated() {
    let fx = setup().await;
    fx.cloud.fail(Fault::PutBucketTagging, "AccessDenied");
    let ids = fx.ids(&["orders", "exports"]).await;

    let report = fx
        .svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Team", "b")]))
        .await
        .unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, Some(ResourceKind::ObjectStore));
    assert_eq!(report.errors[0].resource_id, Some(ids[1]));
    assert_eq!(fx.cloud.bucket_tags("exports").unwrap(), tags(&[("Owner", "a")]));
}

#[tokio::test]
async fn unknown_ids_count_as_failed() {
    let fx = setup().await;
    let mut ids = fx.ids(&["i-4"]).await;
    let missing = Uuid::new_v4();
    ids.push(missing);

    let report = fx
        .svc
        .apply_tags(fx.tenant_id, &ids, tags(&[("Team", "b")]))
        .await
        .unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].resource_id, Some(missing));
    assert_eq!(report.errors[0].error, "resource not found");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_provider_call() {
    let fx = setup().await;
    let ids = fx.ids(&["i-1"]).await;
    let long_key = "k".repeat(129);
    let long_value = "v".repeat(257);

    let cases = [
        (Vec::new(), tags(&[("Team", "b")])),
        (ids.clone(), Tags::new()),
        (ids.clone(), tags(&[("aws:cloudformation:stack", "x")])),
        (ids.clone(), tags(&[(long_key.as_str(), "x")])),
        (ids.clone(), tags(&[("Team", long_value.as_str())])),
    ];
    for (ids, tags) in cases {
        let result = fx.svc.apply_tags(fx.tenant_id, &ids, tags).await;
        assert!(
            matches!(result, Err(InventoryError::Validation { .. })),
            "{result:?}"
        );
    }
    assert!(fx.cloud.tag_calls().is_empty());
}

#[tokio::test]
async fn tenant_without_credentials_is_rejected() {
    let fx = setup().await;
    let other_tenant = Uuid::new_v4();

    let result = fx
        .svc
        .apply_tags(other_tenant, &[Uuid::new_v4()], tags(&[("Team", "b")]))
        .await;

    assert!(matches!(
        result,
        Err(InventoryError::CredentialsNotConfigured { tenant_id }) if tenant_id == other_tenant
    ));
}
