use std::sync::Arc;

use async_trait::async_trait;
use cloudinv_core::models::resource::{
    CloudResource, NewResource, ResourceKind, ResourceMetadata, Tags,
};

use super::{Discovered, DiscoveryContext, ResourceDiscoverer, ResourceTagger};
use crate::api::{BlockStorageApi, RawVolume};
use crate::error::ProviderResult;
use crate::normalize;

pub struct VolumeDiscoverer {
    block_storage: Arc<dyn BlockStorageApi>,
}

impl VolumeDiscoverer {
    pub fn new(block_storage: Arc<dyn BlockStorageApi>) -> Self {
        Self { block_storage }
    }

    fn normalize(ctx: &DiscoveryContext, volume: RawVolume) -> NewResource {
        let tags = normalize::flatten_tags(&volume.tags);

        NewResource {
            tenant_id: ctx.tenant_id,
            provider_id: format!(
                "arn:aws:ec2:{}:{}:volume/{}",
                ctx.region, ctx.account_id, volume.volume_id
            ),
            name: normalize::display_name(&tags, &volume.volume_id),
            short_id: volume.volume_id,
            kind: ResourceKind::BlockVolume,
            region: ctx.region.clone(),
            status: normalize::volume_status(&volume.state),
            estimated_monthly_cost: normalize::volume_monthly_cost(
                &volume.volume_type,
                volume.size_gb,
            ),
            actual_monthly_cost: None,
            is_encrypted: volume.encrypted.unwrap_or(false),
            is_public: false,
            has_backup: volume.latest_snapshot_at.is_some(),
            tags,
            metadata: ResourceMetadata::Volume {
                volume_type: volume.volume_type,
                size_gb: volume.size_gb,
                iops: volume.iops,
                attached_instance_id: volume.attached_instance_id,
            },
        }
    }
}

#[async_trait]
impl ResourceDiscoverer for VolumeDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlockVolume
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> ProviderResult<Discovered> {
        let volumes = self.block_storage.describe_volumes(&ctx.region).await?;
        let resources: Vec<NewResource> = volumes
            .into_iter()
            .map(|v| Self::normalize(ctx, v))
            .collect();
        Ok(resources.into())
    }
}

#[async_trait]
impl ResourceTagger for VolumeDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlockVolume
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn write_tags(
        &self,
        region: &str,
        resources: &[&CloudResource],
        tags: &Tags,
    ) -> ProviderResult<()> {
        let ids: Vec<String> = resources.iter().map(|r| r.short_id.clone()).collect();
        self.block_storage
            .create_volume_tags(region, &ids, tags)
            .await
    }
}
