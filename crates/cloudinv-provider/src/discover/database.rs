use std::sync::Arc;

use async_trait::async_trait;
use cloudinv_core::models::resource::{
    CloudResource, NewResource, ResourceKind, ResourceMetadata, Tags,
};

use tracing::warn;

use super::{Discovered, DiscoveryContext, ResourceDiscoverer, ResourceTagger};
use crate::api::{DatabaseApi, RawDbInstance, RawTag};
use crate::error::ProviderResult;
use crate::normalize;

pub struct DatabaseDiscoverer {
    database: Arc<dyn DatabaseApi>,
}

impl DatabaseDiscoverer {
    pub fn new(database: Arc<dyn DatabaseApi>) -> Self {
        Self { database }
    }

    fn normalize(ctx: &DiscoveryContext, db: RawDbInstance, raw_tags: &[RawTag]) -> NewResource {
        let tags = normalize::flatten_tags(raw_tags);

        NewResource {
            tenant_id: ctx.tenant_id,
            provider_id: db.arn,
            short_id: db.identifier.clone(),
            name: db.identifier,
            kind: ResourceKind::ManagedDatabase,
            region: ctx.region.clone(),
            status: normalize::database_status(&db.status),
            estimated_monthly_cost: normalize::database_monthly_cost(&db.instance_class),
            actual_monthly_cost: None,
            is_encrypted: db.storage_encrypted.unwrap_or(false),
            is_public: db.publicly_accessible,
            has_backup: db.backup_retention_days > 0,
            tags,
            metadata: ResourceMetadata::Database {
                engine: db.engine,
                engine_version: db.engine_version,
                instance_class: db.instance_class,
                allocated_storage_gb: db.allocated_storage_gb,
                multi_az: db.multi_az,
                backup_retention_days: db.backup_retention_days,
            },
        }
    }
}

#[async_trait]
impl ResourceDiscoverer for DatabaseDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ManagedDatabase
    }

    /// A database whose tags cannot be read is skipped and reported.
    async fn discover(&self, ctx: &DiscoveryContext) -> ProviderResult<Discovered> {
        let instances = self.database.describe_db_instances(&ctx.region).await?;

        let mut found = Discovered::default();
        for db in instances {
            match self
                .database
                .list_tags_for_resource(&ctx.region, &db.arn)
                .await
            {
                Ok(tags) => found.resources.push(Self::normalize(ctx, db, &tags)),
                Err(e) => {
                    warn!(arn = %db.arn, error = %e, "Database tag lookup failed");
                    found.skipped.push(e);
                }
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl ResourceTagger for DatabaseDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ManagedDatabase
    }

    fn reads_tags(&self) -> bool {
        true
    }

    async fn read_tags(&self, region: &str, resource: &CloudResource) -> ProviderResult<Tags> {
        let raw = self
            .database
            .list_tags_for_resource(region, &resource.provider_id)
            .await?;
        Ok(normalize::flatten_tags(&raw))
    }

    async fn write_tags(
        &self,
        region: &str,
        resources: &[&CloudResource],
        tags: &Tags,
    ) -> ProviderResult<()> {
        for resource in resources {
            self.database
                .add_tags_to_resource(region, &resource.provider_id, tags)
                .await?;
        }
        Ok(())
    }
}
