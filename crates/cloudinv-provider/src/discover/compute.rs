use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudinv_core::models::resource::{
    CloudResource, NewResource, ResourceKind, ResourceMetadata, Tags,
};

use super::{Discovered, DiscoveryContext, ResourceDiscoverer, ResourceTagger};
use crate::api::{BlockStorageApi, ComputeApi, RawInstance, RawVolume};
use crate::error::ProviderResult;
use crate::normalize;

pub struct ComputeDiscoverer {
    compute: Arc<dyn ComputeApi>,
    block_storage: Arc<dyn BlockStorageApi>,
}

impl ComputeDiscoverer {
    pub fn new(compute: Arc<dyn ComputeApi>, block_storage: Arc<dyn BlockStorageApi>) -> Self {
        Self {
            compute,
            block_storage,
        }
    }

    fn normalize(
        ctx: &DiscoveryContext,
        instance: RawInstance,
        volumes: &HashMap<String, RawVolume>,
    ) -> NewResource {
        let tags = normalize::flatten_tags(&instance.tags);
        let attached: Vec<&RawVolume> = instance
            .volume_ids
            .iter()
            .filter_map(|id| volumes.get(id))
            .collect();

        // Every attached volume must be found and report encryption.
        let is_encrypted = !instance.volume_ids.is_empty()
            && attached.len() == instance.volume_ids.len()
            && attached.iter().all(|v| v.encrypted == Some(true));

        // Recency is judged at scan time; only provider facts are stored.
        let latest_snapshot_at = if attached.is_empty() {
            None
        } else {
            attached
                .iter()
                .map(|v| v.latest_snapshot_at)
                .collect::<Option<Vec<DateTime<Utc>>>>()
                .and_then(|times| times.into_iter().min())
        };

        NewResource {
            tenant_id: ctx.tenant_id,
            provider_id: format!(
                "arn:aws:ec2:{}:{}:instance/{}",
                ctx.region, ctx.account_id, instance.instance_id
            ),
            name: normalize::display_name(&tags, &instance.instance_id),
            short_id: instance.instance_id,
            kind: ResourceKind::ComputeInstance,
            region: ctx.region.clone(),
            status: normalize::compute_status(&instance.state),
            estimated_monthly_cost: normalize::compute_monthly_cost(&instance.instance_type),
            actual_monthly_cost: None,
            is_encrypted,
            is_public: instance.public_ip.is_some(),
            has_backup: latest_snapshot_at.is_some(),
            tags,
            metadata: ResourceMetadata::Compute {
                instance_type: instance.instance_type,
                platform: instance.platform,
                public_ip: instance.public_ip,
                private_ip: instance.private_ip,
                vpc_id: instance.vpc_id,
                launched_at: instance.launch_time,
                latest_snapshot_at,
            },
        }
    }
}

#[async_trait]
impl ResourceDiscoverer for ComputeDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeInstance
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> ProviderResult<Discovered> {
        let instances = self.compute.describe_instances(&ctx.region).await?;
        if instances.is_empty() {
            return Ok(Discovered::default());
        }

        let volumes: HashMap<String, RawVolume> = self
            .block_storage
            .describe_volumes(&ctx.region)
            .await?
            .into_iter()
            .map(|v| (v.volume_id.clone(), v))
            .collect();

        let resources: Vec<NewResource> = instances
            .into_iter()
            .map(|instance| Self::normalize(ctx, instance, &volumes))
            .collect();
        Ok(resources.into())
    }
}

#[async_trait]
impl ResourceTagger for ComputeDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeInstance
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
        self.compute.create_tags(region, &ids, tags).await
    }
}
