//! In-memory provider.
//!
//! Implements every capability trait over a shared, mutable account
//! state. Used by the test suites and by the server's sandbox mode,
//! where the state is seeded from a JSON fixture. Individual API calls
//! can be made to fail with [`InMemoryCloud::fail`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cloudinv_core::models::resource::Tags;
use serde::Deserialize;

use crate::api::{
    BlockStorageApi, BucketMetrics, ComputeApi, DatabaseApi, ObjectStorageApi, PublicAccessBlock,
    RawBucket, RawDbInstance, RawGrant, RawInstance, RawTag, RawVolume,
};
use crate::credentials::{ClientFactory, ProviderCredentials, ServiceClients};
use crate::error::{ProviderError, ProviderResult};

/// API calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    DescribeInstances,
    DescribeVolumes,
    DescribeDbInstances,
    ListDbTags,
    ListBuckets,
    BucketEncryption,
    BucketAcl,
    BucketPolicyStatus,
    BucketTagging,
    TagInstances,
    TagVolumes,
    TagDatabase,
    PutBucketTagging,
}

/// One recorded tag write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCall {
    pub service: &'static str,
    pub region: String,
    pub ids: Vec<String>,
}

/// A bucket and the configuration the storage API reports for it.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketFixture {
    pub bucket: RawBucket,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub grants: Vec<RawGrant>,
    #[serde(default)]
    pub public_access_block: Option<PublicAccessBlock>,
    #[serde(default)]
    pub policy_public: Option<bool>,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default)]
    pub metrics: Option<BucketMetrics>,
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

impl BucketFixture {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: RawBucket {
                name: name.into(),
                region: region.into(),
                created_at: None,
            },
            encryption: None,
            grants: Vec::new(),
            public_access_block: None,
            policy_public: None,
            versioning: false,
            metrics: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct RegionalDb {
    region: String,
    instance: RawDbInstance,
    tags: Vec<RawTag>,
}

/// Seed document for sandbox mode. Resources are keyed by region.
#[derive(Debug, Default, Deserialize)]
pub struct CloudFixture {
    #[serde(default)]
    pub instances: BTreeMap<String, Vec<RawInstance>>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Vec<RawVolume>>,
    #[serde(default)]
    pub databases: BTreeMap<String, Vec<DbFixture>>,
    #[serde(default)]
    pub buckets: Vec<BucketFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbFixture {
    #[serde(flatten)]
    pub instance: RawDbInstance,
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Default)]
struct CloudState {
    instances: BTreeMap<String, Vec<RawInstance>>,
    volumes: BTreeMap<String, Vec<RawVolume>>,
    databases: Vec<RegionalDb>,
    buckets: Vec<BucketFixture>,
    faults: HashMap<Fault, String>,
    failing_ids: HashSet<String>,
    failing_reads: HashSet<String>,
    tag_calls: Vec<TagCall>,
}

impl CloudState {
    fn check(&self, fault: Fault) -> ProviderResult<()> {
        match self.faults.get(&fault) {
            Some(message) => Err(ProviderError::api(service_of(fault), message.clone())),
            None => Ok(()),
        }
    }

    fn check_ids(&self, fault: Fault, ids: &[String]) -> ProviderResult<()> {
        self.check(fault)?;
        match ids.iter().find(|id| self.failing_ids.contains(*id)) {
            Some(id) => Err(ProviderError::api(
                service_of(fault),
                format!("tagging rejected for {id}"),
            )),
            None => Ok(()),
        }
    }

    fn check_read(&self, fault: Fault, id: &str) -> ProviderResult<()> {
        self.check(fault)?;
        if self.failing_reads.contains(id) {
            return Err(ProviderError::api(
                service_of(fault),
                format!("AccessDenied: {id}"),
            ));
        }
        Ok(())
    }

    fn bucket(&self, name: &str) -> ProviderResult<&BucketFixture> {
        self.buckets
            .iter()
            .find(|b| b.bucket.name == name)
            .ok_or_else(|| ProviderError::api("s3", format!("NoSuchBucket: {name}")))
    }

    fn bucket_mut(&mut self, name: &str) -> ProviderResult<&mut BucketFixture> {
        self.buckets
            .iter_mut()
            .find(|b| b.bucket.name == name)
            .ok_or_else(|| ProviderError::api("s3", format!("NoSuchBucket: {name}")))
    }
}

fn service_of(fault: Fault) -> &'static str {
    match fault {
        Fault::DescribeInstances | Fault::TagInstances => "ec2",
        Fault::DescribeVolumes | Fault::TagVolumes => "ebs",
        Fault::DescribeDbInstances | Fault::ListDbTags | Fault::TagDatabase => "rds",
        Fault::ListBuckets
        | Fault::BucketEncryption
        | Fault::BucketAcl
        | Fault::BucketPolicyStatus
        | Fault::BucketTagging
        | Fault::PutBucketTagging => "s3",
    }
}

/// Merge `tags` into a provider tag list, overwriting equal keys.
fn merge_into(list: &mut Vec<RawTag>, tags: &Tags) {
    for (key, value) in tags {
        match list.iter_mut().find(|t| &t.key == key) {
            Some(existing) => existing.value = value.clone(),
            None => list.push(RawTag::new(key.clone(), value.clone())),
        }
    }
}

/// A single simulated cloud account.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCloud {
    state: Arc<Mutex<CloudState>>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: CloudFixture) -> Self {
        let cloud = Self::new();
        {
            let mut state = cloud.state();
            state.instances = fixture.instances;
            state.volumes = fixture.volumes;
            state.databases = fixture
                .databases
                .into_iter()
                .flat_map(|(region, dbs)| {
                    dbs.into_iter().map(move |db| RegionalDb {
                        region: region.clone(),
                        instance: db.instance,
                        tags: db.tags,
                    })
                })
                .collect();
            state.buckets = fixture.buckets;
        }
        cloud
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_fixture(serde_json::from_str(json)?))
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_instance(&self, region: &str, instance: RawInstance) {
        self.state()
            .instances
            .entry(region.to_string())
            .or_default()
            .push(instance);
    }

    pub fn add_volume(&self, region: &str, volume: RawVolume) {
        self.state()
            .volumes
            .entry(region.to_string())
            .or_default()
            .push(volume);
    }

    pub fn add_database(&self, region: &str, instance: RawDbInstance, tags: Vec<RawTag>) {
        self.state().databases.push(RegionalDb {
            region: region.to_string(),
            instance,
            tags,
        });
    }

    pub fn add_bucket(&self, bucket: BucketFixture) {
        self.state().buckets.push(bucket);
    }

    /// Change the provider lifecycle string of an instance.
    pub fn set_instance_state(&self, instance_id: &str, new_state: &str) {
        let mut state = self.state();
        for instance in state.instances.values_mut().flatten() {
            if instance.instance_id == instance_id {
                instance.state = new_state.to_string();
            }
        }
    }

    /// Make every call of `fault` fail with `message` until cleared.
    pub fn fail(&self, fault: Fault, message: impl Into<String>) {
        self.state().faults.insert(fault, message.into());
    }

    pub fn clear_fault(&self, fault: Fault) {
        self.state().faults.remove(&fault);
    }

    /// Reject any tag write that includes this id.
    pub fn fail_tagging_for(&self, id: impl Into<String>) {
        self.state().failing_ids.insert(id.into());
    }

    /// Reject tag reads of this bucket name or database ARN.
    pub fn fail_tag_reads_for(&self, id: impl Into<String>) {
        self.state().failing_reads.insert(id.into());
    }

    pub fn instance_tags(&self, instance_id: &str) -> Option<Tags> {
        let state = self.state();
        state
            .instances
            .values()
            .flatten()
            .find(|i| i.instance_id == instance_id)
            .map(|i| crate::normalize::flatten_tags(&i.tags))
    }

    pub fn volume_tags(&self, volume_id: &str) -> Option<Tags> {
        let state = self.state();
        state
            .volumes
            .values()
            .flatten()
            .find(|v| v.volume_id == volume_id)
            .map(|v| crate::normalize::flatten_tags(&v.tags))
    }

    pub fn database_tags(&self, arn: &str) -> Option<Tags> {
        let state = self.state();
        state
            .databases
            .iter()
            .find(|d| d.instance.arn == arn)
            .map(|d| crate::normalize::flatten_tags(&d.tags))
    }

    pub fn bucket_tags(&self, name: &str) -> Option<Tags> {
        let state = self.state();
        state
            .buckets
            .iter()
            .find(|b| b.bucket.name == name)
            .map(|b| crate::normalize::flatten_tags(&b.tags))
    }

    /// Every tag write made so far, in call order.
    pub fn tag_calls(&self) -> Vec<TagCall> {
        self.state().tag_calls.clone()
    }

    pub fn clients(&self) -> ServiceClients {
        ServiceClients {
            compute: Arc::new(self.clone()),
            block_storage: Arc::new(self.clone()),
            database: Arc::new(self.clone()),
            object_storage: Arc::new(self.clone()),
        }
    }
}

#[async_trait]
impl ComputeApi for InMemoryCloud {
    async fn describe_instances(&self, region: &str) -> ProviderResult<Vec<RawInstance>> {
        let state = self.state();
        state.check(Fault::DescribeInstances)?;
        Ok(state.instances.get(region).cloned().unwrap_or_default())
    }

    async fn create_tags(
        &self,
        region: &str,
        instance_ids: &[String],
        tags: &Tags,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.check_ids(Fault::TagInstances, instance_ids)?;
        let instances = state
            .instances
            .get_mut(region)
            .ok_or_else(|| ProviderError::api("ec2", format!("no instances in {region}")))?;
        for id in instance_ids {
            let instance = instances
                .iter_mut()
                .find(|i| &i.instance_id == id)
                .ok_or_else(|| ProviderError::api("ec2", format!("InvalidInstanceID: {id}")))?;
            merge_into(&mut instance.tags, tags);
        }
        state.tag_calls.push(TagCall {
            service: "ec2",
            region: region.to_string(),
            ids: instance_ids.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl BlockStorageApi for InMemoryCloud {
    async fn describe_volumes(&self, region: &str) -> ProviderResult<Vec<RawVolume>> {
        let state = self.state();
        state.check(Fault::DescribeVolumes)?;
        Ok(state.volumes.get(region).cloned().unwrap_or_default())
    }

    async fn create_volume_tags(
        &self,
        region: &str,
        volume_ids: &[String],
        tags: &Tags,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.check_ids(Fault::TagVolumes, volume_ids)?;
        let volumes = state
            .volumes
            .get_mut(region)
            .ok_or_else(|| ProviderError::api("ebs", format!("no volumes in {region}")))?;
        for id in volume_ids {
            let volume = volumes
                .iter_mut()
                .find(|v| &v.volume_id == id)
                .ok_or_else(|| ProviderError::api("ebs", format!("InvalidVolume.NotFound: {id}")))?;
            merge_into(&mut volume.tags, tags);
        }
        state.tag_calls.push(TagCall {
            service: "ebs",
            region: region.to_string(),
            ids: volume_ids.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl DatabaseApi for InMemoryCloud {
    async fn describe_db_instances(&self, region: &str) -> ProviderResult<Vec<RawDbInstance>> {
        let state = self.state();
        state.check(Fault::DescribeDbInstances)?;
        Ok(state
            .databases
            .iter()
            .filter(|d| d.region == region)
            .map(|d| d.instance.clone())
            .collect())
    }

    async fn list_tags_for_resource(&self, _region: &str, arn: &str) -> ProviderResult<Vec<RawTag>> {
        let state = self.state();
        state.check_read(Fault::ListDbTags, arn)?;
        state
            .databases
            .iter()
            .find(|d| d.instance.arn == arn)
            .map(|d| d.tags.clone())
            .ok_or_else(|| ProviderError::api("rds", format!("DBInstanceNotFound: {arn}")))
    }

    async fn add_tags_to_resource(&self, region: &str, arn: &str, tags: &Tags) -> ProviderResult<()> {
        let mut state = self.state();
        state.check_ids(Fault::TagDatabase, &[arn.to_string()])?;
        let db = state
            .databases
            .iter_mut()
            .find(|d| d.instance.arn == arn)
            .ok_or_else(|| ProviderError::api("rds", format!("DBInstanceNotFound: {arn}")))?;
        merge_into(&mut db.tags, tags);
        state.tag_calls.push(TagCall {
            service: "rds",
            region: region.to_string(),
            ids: vec![arn.to_string()],
        });
        Ok(())
    }
}

#[async_trait]
impl ObjectStorageApi for InMemoryCloud {
    async fn list_buckets(&self) -> ProviderResult<Vec<RawBucket>> {
        let state = self.state();
        state.check(Fault::ListBuckets)?;
        Ok(state.buckets.iter().map(|b| b.bucket.clone()).collect())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> ProviderResult<Option<String>> {
        let state = self.state();
        state.check(Fault::BucketEncryption)?;
        Ok(state.bucket(bucket)?.encryption.clone())
    }

    async fn get_bucket_acl(&self, bucket: &str) -> ProviderResult<Vec<RawGrant>> {
        let state = self.state();
        state.check(Fault::BucketAcl)?;
        Ok(state.bucket(bucket)?.grants.clone())
    }

    async fn get_public_access_block(
        &self,
        bucket: &str,
    ) -> ProviderResult<Option<PublicAccessBlock>> {
        let state = self.state();
        Ok(state.bucket(bucket)?.public_access_block)
    }

    async fn get_bucket_policy_status(&self, bucket: &str) -> ProviderResult<Option<bool>> {
        let state = self.state();
        state.check(Fault::BucketPolicyStatus)?;
        Ok(state.bucket(bucket)?.policy_public)
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> ProviderResult<bool> {
        let state = self.state();
        Ok(state.bucket(bucket)?.versioning)
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> ProviderResult<Vec<RawTag>> {
        let state = self.state();
        state.check_read(Fault::BucketTagging, bucket)?;
        Ok(state.bucket(bucket)?.tags.clone())
    }

    async fn get_bucket_metrics(&self, bucket: &str) -> ProviderResult<Option<BucketMetrics>> {
        let state = self.state();
        Ok(state.bucket(bucket)?.metrics)
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &Tags) -> ProviderResult<()> {
        let mut state = self.state();
        state.check_ids(Fault::PutBucketTagging, &[bucket.to_string()])?;
        let region = {
            let fixture = state.bucket_mut(bucket)?;
            fixture.tags = tags
                .iter()
                .map(|(k, v)| RawTag::new(k.clone(), v.clone()))
                .collect();
            fixture.bucket.region.clone()
        };
        state.tag_calls.push(TagCall {
            service: "s3",
            region,
            ids: vec![bucket.to_string()],
        });
        Ok(())
    }
}

/// [`ClientFactory`] handing out in-memory accounts by account id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClientFactory {
    accounts: HashMap<String, InMemoryCloud>,
}

impl InMemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account_id: impl Into<String>, cloud: InMemoryCloud) -> Self {
        self.accounts.insert(account_id.into(), cloud);
        self
    }
}

impl ClientFactory for InMemoryClientFactory {
    fn build(&self, credentials: &ProviderCredentials) -> ProviderResult<ServiceClients> {
        self.accounts
            .get(&credentials.account_id)
            .map(InMemoryCloud::clients)
            .ok_or_else(|| {
                ProviderError::Client(format!("unknown account {}", credentials.account_id))
            })
    }
}
