//! Discoverer and credential resolver tests against the in-memory provider.

use std::sync::Arc;

use chrono::{Duration, Utc};
use cloudinv_core::models::resource::{
    NewResource, ResourceKind, ResourceMetadata, ResourceStatus,
};
use cloudinv_provider::api::{
    BucketMetrics, PublicAccessBlock, RawDbInstance, RawGrant, RawInstance, RawTag, RawVolume,
};
use cloudinv_provider::memory::{BucketFixture, Fault};
use cloudinv_provider::{
    CredentialResolver, Discovered, DiscoveryContext, InMemoryClientFactory, InMemoryCloud, KindRegistry,
    ProviderCredentials, ProviderError, StaticCredentialStore,
};
use uuid::Uuid;

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-east-1";

fn ctx() -> DiscoveryContext {
    DiscoveryContext {
        tenant_id: Uuid::new_v4(),
        account_id: ACCOUNT.into(),
        region: REGION.into(),
    }
}

fn instance(id: &str, state: &str, volume_ids: &[&str]) -> RawInstance {
    RawInstance {
        instance_id: id.into(),
        instance_type: "t3.micro".into(),
        state: state.into(),
        platform: None,
        public_ip: None,
        private_ip: Some("10.0.0.5".into()),
        vpc_id: Some("vpc-1".into()),
        launch_time: None,
        volume_ids: volume_ids.iter().map(|v| v.to_string()).collect(),
        tags: vec![RawTag::new("Name", format!("host-{id}"))],
    }
}

fn volume(id: &str, encrypted: Option<bool>, attached: Option<&str>) -> RawVolume {
    RawVolume {
        volume_id: id.into(),
        volume_type: "gp3".into(),
        size_gb: 100,
        iops: Some(3000),
        state: if attached.is_some() { "in-use" } else { "available" }.into(),
        encrypted,
        attached_instance_id: attached.map(Into::into),
        latest_snapshot_at: None,
        tags: Vec::new(),
    }
}

async fn discover_with_skips(
    cloud: &InMemoryCloud,
    kind: ResourceKind,
) -> Result<Discovered, ProviderError> {
    let registry = KindRegistry::from_clients(&cloud.clients());
    registry.discoverer(kind).unwrap().discover(&ctx()).await
}

async fn discover(cloud: &InMemoryCloud, kind: ResourceKind) -> Result<Vec<NewResource>, ProviderError> {
    let found = discover_with_skips(cloud, kind).await?;
    assert!(found.skipped.is_empty(), "{:?}", found.skipped);
    Ok(found.resources)
}

#[tokio::test]
async fn compute_encryption_requires_every_volume_encrypted() {
    let cloud = InMemoryCloud::new();
    cloud.add_instance(REGION, instance("i-enc", "running", &["vol-a", "vol-b"]));
    cloud.add_instance(REGION, instance("i-mixed", "running", &["vol-c", "vol-d"]));
    cloud.add_instance(REGION, instance("i-missing", "shutting-down", &["vol-gone"]));
    cloud.add_volume(REGION, volume("vol-a", Some(true), Some("i-enc")));
    cloud.add_volume(REGION, volume("vol-b", Some(true), Some("i-enc")));
    cloud.add_volume(REGION, volume("vol-c", Some(true), Some("i-mixed")));
    cloud.add_volume(REGION, volume("vol-d", None, Some("i-mixed")));

    let mut found = discover(&cloud, ResourceKind::ComputeInstance).await.unwrap();
    found.sort_by(|a, b| a.short_id.cmp(&b.short_id));

    assert_eq!(found.len(), 3);
    assert_eq!(found[0].short_id, "i-enc");
    assert!(found[0].is_encrypted);
    assert_eq!(found[0].name, "host-i-enc");
    assert_eq!(
        found[0].provider_id,
        format!("arn:aws:ec2:{REGION}:{ACCOUNT}:instance/i-enc")
    );
    assert!(!found[1].is_encrypted, "unknown flag counts as unencrypted");
    assert!(!found[2].is_encrypted, "missing volume counts as unencrypted");
    assert_eq!(found[2].status, ResourceStatus::Stopping);
}

#[tokio::test]
async fn compute_public_ip_and_recent_snapshots() {
    let cloud = InMemoryCloud::new();
    let mut public = instance("i-pub", "running", &["vol-1"]);
    public.public_ip = Some("54.1.2.3".into());
    public.instance_type = "c7.exotic".into();
    cloud.add_instance(REGION, public);

    let mut snap = volume("vol-1", Some(true), Some("i-pub"));
    snap.latest_snapshot_at = Some(Utc::now() - Duration::days(1));
    cloud.add_volume(REGION, snap);

    let found = discover(&cloud, ResourceKind::ComputeInstance).await.unwrap();
    assert!(found[0].is_public);
    assert!(found[0].has_backup);
    assert_eq!(found[0].estimated_monthly_cost, 50.0);
    assert!(matches!(
        &found[0].metadata,
        ResourceMetadata::Compute { public_ip: Some(ip), .. } if ip == "54.1.2.3"
    ));
}

#[tokio::test]
async fn compute_backup_records_snapshot_time_not_its_age() {
    let cloud = InMemoryCloud::new();
    cloud.add_instance(REGION, instance("i-a", "stopped", &["vol-a", "vol-b"]));
    let taken = Utc::now() - Duration::days(30);

    let mut old = volume("vol-a", Some(true), Some("i-a"));
    old.latest_snapshot_at = Some(taken);
    cloud.add_volume(REGION, old);
    let mut fresh = volume("vol-b", Some(true), Some("i-a"));
    fresh.latest_snapshot_at = Some(Utc::now());
    cloud.add_volume(REGION, fresh);

    let found = discover(&cloud, ResourceKind::ComputeInstance).await.unwrap();
    assert!(found[0].has_backup, "a month-old snapshot still exists");
    assert!(matches!(
        found[0].metadata,
        ResourceMetadata::Compute { latest_snapshot_at: Some(at), .. } if at == taken
    ));
}

#[tokio::test]
async fn database_tags_come_from_child_call() {
    let cloud = InMemoryCloud::new();
    cloud.add_database(
        REGION,
        RawDbInstance {
            identifier: "orders".into(),
            arn: format!("arn:aws:rds:{REGION}:{ACCOUNT}:db:orders"),
            engine: "postgres".into(),
            engine_version: Some("16.2".into()),
            instance_class: "db.t3.micro".into(),
            status: "backing-up".into(),
            allocated_storage_gb: Some(20),
            multi_az: false,
            storage_encrypted: None,
            publicly_accessible: true,
            backup_retention_days: 0,
        },
        vec![RawTag::new("Owner", "payments")],
    );

    let found = discover(&cloud, ResourceKind::ManagedDatabase).await.unwrap();
    let db = &found[0];
    assert_eq!(db.tags["Owner"], "payments");
    assert_eq!(db.status, ResourceStatus::Running);
    assert!(!db.is_encrypted);
    assert!(db.is_public);
    assert!(!db.has_backup);
    assert_eq!(db.estimated_monthly_cost, 12.41);

    cloud.fail(Fault::ListDbTags, "AccessDenied");
    let found = discover_with_skips(&cloud, ResourceKind::ManagedDatabase)
        .await
        .unwrap();
    assert!(found.resources.is_empty());
    assert_eq!(found.skipped.len(), 1);
    assert_eq!(found.skipped[0].service(), "rds");

    cloud.fail(Fault::DescribeDbInstances, "Throttling");
    let err = discover(&cloud, ResourceKind::ManagedDatabase).await.unwrap_err();
    assert_eq!(err.to_string(), "rds: Throttling");
}

#[tokio::test]
async fn unreadable_bucket_tags_skip_only_that_bucket() {
    let cloud = InMemoryCloud::new();
    for name in ["alpha", "bravo", "charlie"] {
        let mut bucket = BucketFixture::new(name, REGION);
        bucket.tags = vec![RawTag::new("Owner", "data")];
        cloud.add_bucket(bucket);
    }
    cloud.fail_tag_reads_for("bravo");

    let found = discover_with_skips(&cloud, ResourceKind::ObjectStore)
        .await
        .unwrap();

    let names: Vec<&str> = found.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "charlie"]);
    assert!(found.resources.iter().all(|r| r.tags["Owner"] == "data"));
    assert_eq!(found.skipped.len(), 1);
    assert_eq!(found.skipped[0].to_string(), "s3: AccessDenied: bravo");
}

#[tokio::test]
async fn bucket_flags_and_region_filter() {
    let cloud = InMemoryCloud::new();

    let mut safe = BucketFixture::new("assets", REGION);
    safe.encryption = Some("AES256".into());
    safe.public_access_block = Some(PublicAccessBlock::all());
    safe.grants = vec![RawGrant {
        grantee_uri: Some("http://acs.amazonaws.com/groups/global/AllUsers".into()),
        permission: "READ".into(),
    }];
    safe.versioning = true;
    safe.metrics = Some(BucketMetrics {
        object_count: 10,
        size_bytes: 2048,
    });
    cloud.add_bucket(safe);

    let mut open = BucketFixture::new("uploads", REGION);
    open.policy_public = Some(true);
    open.tags = vec![RawTag::new("Team", "web")];
    cloud.add_bucket(open);

    cloud.add_bucket(BucketFixture::new("elsewhere", "eu-west-1"));

    let mut found = discover(&cloud, ResourceKind::ObjectStore).await.unwrap();
    found.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(found.len(), 2, "buckets of other regions are skipped");

    let assets = &found[0];
    assert!(assets.is_encrypted);
    assert!(!assets.is_public, "full access block overrides public ACL");
    assert!(assets.has_backup);
    assert_eq!(assets.provider_id, "arn:aws:s3:::assets");
    assert!(matches!(
        assets.metadata,
        ResourceMetadata::ObjectStore { object_count: Some(10), public_access_block: true, .. }
    ));

    let uploads = &found[1];
    assert!(!uploads.is_encrypted);
    assert!(uploads.is_public);
    assert_eq!(uploads.tags["Team"], "web");
    assert!(matches!(
        uploads.metadata,
        ResourceMetadata::ObjectStore { object_count: None, .. }
    ));
}

#[tokio::test]
async fn bucket_lookup_failures_flag_the_bucket() {
    let cloud = InMemoryCloud::new();
    let mut bucket = BucketFixture::new("secured", REGION);
    bucket.encryption = Some("aws:kms".into());
    cloud.add_bucket(bucket);

    cloud.fail(Fault::BucketEncryption, "AccessDenied");
    cloud.fail(Fault::BucketAcl, "AccessDenied");

    let found = discover(&cloud, ResourceKind::ObjectStore).await.unwrap();
    assert!(!found[0].is_encrypted);
    assert!(found[0].is_public);
}

#[tokio::test]
async fn volume_status_and_cost() {
    let cloud = InMemoryCloud::new();
    cloud.add_volume(REGION, volume("vol-free", Some(true), None));

    let found = discover(&cloud, ResourceKind::BlockVolume).await.unwrap();
    assert_eq!(found[0].status, ResourceStatus::Available);
    assert!((found[0].estimated_monthly_cost - 8.0).abs() < 1e-9);
    assert!(found[0].is_encrypted);
}

#[tokio::test]
async fn resolver_returns_disabled_bundle_without_credentials() {
    let cloud = InMemoryCloud::new();
    let configured = Uuid::new_v4();
    let store = StaticCredentialStore::new().with(
        configured,
        ProviderCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: None,
            account_id: ACCOUNT.into(),
            regions: vec!["us-east-1".into(), "eu-west-1".into()],
        },
    );
    let resolver = CredentialResolver::new(
        Arc::new(store),
        Arc::new(InMemoryClientFactory::new().with_account(ACCOUNT, cloud)),
    );

    let clients = resolver.resolve(configured).await.unwrap();
    assert!(clients.enabled);
    assert_eq!(clients.account_id, ACCOUNT);
    assert_eq!(clients.regions.len(), 2);
    assert_eq!(clients.registry().kinds(), ResourceKind::ALL.to_vec());

    let disabled = resolver.resolve(Uuid::new_v4()).await.unwrap();
    assert!(!disabled.enabled);
    assert!(disabled.registry().discoverer(ResourceKind::ObjectStore).is_none());
}

#[tokio::test]
async fn resolver_surfaces_unknown_accounts() {
    let tenant = Uuid::new_v4();
    let store = StaticCredentialStore::new().with(
        tenant,
        ProviderCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: None,
            account_id: "999999999999".into(),
            regions: vec![],
        },
    );
    let resolver = CredentialResolver::new(Arc::new(store), Arc::new(InMemoryClientFactory::new()));

    let err = resolver.resolve(tenant).await.err().unwrap();
    assert!(matches!(err, ProviderError::Client(_)));
}
