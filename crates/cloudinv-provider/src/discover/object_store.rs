use std::sync::Arc;

use async_trait::async_trait;
use cloudinv_core::models::resource::{
    CloudResource, NewResource, ResourceKind, ResourceMetadata, ResourceStatus, Tags,
};
use tracing::{debug, warn};

use super::{Discovered, DiscoveryContext, ResourceDiscoverer, ResourceTagger};
use crate::api::{ObjectStorageApi, RawBucket, RawGrant};
use crate::error::ProviderResult;
use crate::normalize;

const PUBLIC_GRANTEES: &[&str] = &[
    "http://acs.amazonaws.com/groups/global/AllUsers",
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers",
];

fn grants_are_public(grants: &[RawGrant]) -> bool {
    grants.iter().any(|g| {
        g.grantee_uri
            .as_deref()
            .is_some_and(|uri| PUBLIC_GRANTEES.contains(&uri))
    })
}

pub struct ObjectStoreDiscoverer {
    storage: Arc<dyn ObjectStorageApi>,
}

impl ObjectStoreDiscoverer {
    pub fn new(storage: Arc<dyn ObjectStorageApi>) -> Self {
        Self { storage }
    }

    /// Security lookups that fail resolve to the value that gets the
    /// bucket flagged: unencrypted and public. A failed tag lookup fails
    /// the bucket.
    async fn normalize(
        &self,
        ctx: &DiscoveryContext,
        bucket: RawBucket,
    ) -> ProviderResult<NewResource> {
        let name = bucket.name;

        let is_encrypted = match self.storage.get_bucket_encryption(&name).await {
            Ok(config) => config.is_some(),
            Err(e) => {
                debug!(bucket = %name, error = %e, "Encryption lookup failed");
                false
            }
        };

        let access_block = self
            .storage
            .get_public_access_block(&name)
            .await
            .unwrap_or_default()
            .unwrap_or_default();

        let acl_public = match self.storage.get_bucket_acl(&name).await {
            Ok(grants) => grants_are_public(&grants),
            Err(e) => {
                debug!(bucket = %name, error = %e, "ACL lookup failed");
                true
            }
        };
        let policy_public = match self.storage.get_bucket_policy_status(&name).await {
            Ok(status) => status.unwrap_or(false),
            Err(e) => {
                debug!(bucket = %name, error = %e, "Policy status lookup failed");
                true
            }
        };
        let is_public = (acl_public && !access_block.ignore_public_acls)
            || (policy_public && !access_block.restrict_public_buckets);

        let versioning_enabled = self
            .storage
            .get_bucket_versioning(&name)
            .await
            .unwrap_or(false);
        let metrics = self.storage.get_bucket_metrics(&name).await.unwrap_or(None);
        let tags = match self.storage.get_bucket_tagging(&name).await {
            Ok(raw) => normalize::flatten_tags(&raw),
            Err(e) => {
                warn!(bucket = %name, error = %e, "Bucket tag lookup failed");
                return Err(e);
            }
        };

        let size_bytes = metrics.map(|m| m.size_bytes);

        Ok(NewResource {
            tenant_id: ctx.tenant_id,
            provider_id: format!("arn:aws:s3:::{name}"),
            short_id: name.clone(),
            name,
            kind: ResourceKind::ObjectStore,
            region: ctx.region.clone(),
            tags,
            status: ResourceStatus::Available,
            estimated_monthly_cost: normalize::bucket_monthly_cost(size_bytes),
            actual_monthly_cost: None,
            is_encrypted,
            is_public,
            has_backup: versioning_enabled,
            metadata: ResourceMetadata::ObjectStore {
                object_count: metrics.map(|m| m.object_count),
                size_bytes,
                versioning_enabled,
                public_access_block: access_block.is_full(),
            },
        })
    }
}

#[async_trait]
impl ResourceDiscoverer for ObjectStoreDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ObjectStore
    }

    /// A bucket whose tags cannot be read is skipped and reported; the
    /// other buckets of the region are still returned.
    async fn discover(&self, ctx: &DiscoveryContext) -> ProviderResult<Discovered> {
        let buckets = self.storage.list_buckets().await?;

        let mut found = Discovered::default();
        for bucket in buckets.into_iter().filter(|b| b.region == ctx.region) {
            match self.normalize(ctx, bucket).await {
                Ok(resource) => found.resources.push(resource),
                Err(e) => found.skipped.push(e),
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl ResourceTagger for ObjectStoreDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ObjectStore
    }

    fn reads_tags(&self) -> bool {
        true
    }

    async fn read_tags(&self, _region: &str, resource: &CloudResource) -> ProviderResult<Tags> {
        let raw = self.storage.get_bucket_tagging(&resource.short_id).await?;
        Ok(normalize::flatten_tags(&raw))
    }

    /// Bucket tagging replaces the whole set, so `tags` must already be
    /// the merged map.
    async fn write_tags(
        &self,
        _region: &str,
        resources: &[&CloudResource],
        tags: &Tags,
    ) -> ProviderResult<()> {
        for resource in resources {
            self.storage
                .put_bucket_tagging(&resource.short_id, tags)
                .await?;
        }
        Ok(())
    }
}
