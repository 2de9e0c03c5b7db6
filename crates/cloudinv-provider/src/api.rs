//! Provider capability interfaces and the raw shapes they return.
//!
//! One trait per provider service. A concrete SDK binding implements
//! these; the discoverers only ever see the raw structs below, which
//! mirror what the provider's describe/list calls report before any
//! normalization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudinv_core::models::resource::Tags;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// A key/value pair as providers report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTag {
    pub key: String,
    pub value: String,
}

impl RawTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInstance {
    pub instance_id: String,
    pub instance_type: String,
    /// Provider lifecycle string, e.g. `shutting-down`.
    pub state: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub launch_time: Option<DateTime<Utc>>,
    /// Ids of the block volumes attached to this instance.
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVolume {
    pub volume_id: String,
    pub volume_type: String,
    pub size_gb: u64,
    #[serde(default)]
    pub iops: Option<u32>,
    pub state: String,
    /// `None` when the provider omitted the flag.
    #[serde(default)]
    pub encrypted: Option<bool>,
    #[serde(default)]
    pub attached_instance_id: Option<String>,
    #[serde(default)]
    pub latest_snapshot_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDbInstance {
    pub identifier: String,
    pub arn: String,
    pub engine: String,
    #[serde(default)]
    pub engine_version: Option<String>,
    pub instance_class: String,
    pub status: String,
    #[serde(default)]
    pub allocated_storage_gb: Option<u64>,
    #[serde(default)]
    pub multi_az: bool,
    #[serde(default)]
    pub storage_encrypted: Option<bool>,
    #[serde(default)]
    pub publicly_accessible: bool,
    #[serde(default)]
    pub backup_retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBucket {
    pub name: String,
    /// Region the bucket lives in. Listing is global.
    pub region: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One ACL grant. Only the grantee group URI matters for exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGrant {
    #[serde(default)]
    pub grantee_uri: Option<String>,
    pub permission: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn all() -> Self {
        Self {
            block_public_acls: true,
            ignore_public_acls: true,
            block_public_policy: true,
            restrict_public_buckets: true,
        }
    }

    pub fn is_full(&self) -> bool {
        self.block_public_acls
            && self.ignore_public_acls
            && self.block_public_policy
            && self.restrict_public_buckets
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub object_count: u64,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instances(&self, region: &str) -> ProviderResult<Vec<RawInstance>>;
    /// Batch tag call: every id in one request.
    async fn create_tags(&self, region: &str, instance_ids: &[String], tags: &Tags)
    -> ProviderResult<()>;
}

#[async_trait]
pub trait BlockStorageApi: Send + Sync {
    async fn describe_volumes(&self, region: &str) -> ProviderResult<Vec<RawVolume>>;
    async fn create_volume_tags(
        &self,
        region: &str,
        volume_ids: &[String],
        tags: &Tags,
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn describe_db_instances(&self, region: &str) -> ProviderResult<Vec<RawDbInstance>>;
    /// Tags are only reachable through a per-instance child call.
    async fn list_tags_for_resource(&self, region: &str, arn: &str) -> ProviderResult<Vec<RawTag>>;
    /// Adds or overwrites the given keys; other keys are left alone.
    async fn add_tags_to_resource(&self, region: &str, arn: &str, tags: &Tags)
    -> ProviderResult<()>;
}

#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    async fn list_buckets(&self) -> ProviderResult<Vec<RawBucket>>;
    /// Default encryption algorithm, `None` if no configuration exists.
    async fn get_bucket_encryption(&self, bucket: &str) -> ProviderResult<Option<String>>;
    async fn get_bucket_acl(&self, bucket: &str) -> ProviderResult<Vec<RawGrant>>;
    async fn get_public_access_block(&self, bucket: &str)
    -> ProviderResult<Option<PublicAccessBlock>>;
    /// Whether the bucket policy makes the bucket public. `None` when
    /// the bucket has no policy.
    async fn get_bucket_policy_status(&self, bucket: &str) -> ProviderResult<Option<bool>>;
    async fn get_bucket_versioning(&self, bucket: &str) -> ProviderResult<bool>;
    /// Empty when the bucket has no tag set.
    async fn get_bucket_tagging(&self, bucket: &str) -> ProviderResult<Vec<RawTag>>;
    /// `None` when storage metrics are not available yet.
    async fn get_bucket_metrics(&self, bucket: &str) -> ProviderResult<Option<BucketMetrics>>;
    /// Replaces the whole tag set of the bucket.
    async fn put_bucket_tagging(&self, bucket: &str, tags: &Tags) -> ProviderResult<()>;
}
