//! Bulk tag remediation.
//!
//! Resources are grouped by (kind, region) and each group is written
//! through the kind's tagger, one group after another. Existing tags
//! are always merged with the new ones (new values win); nothing is
//! blind-overwritten. Successful writes are mirrored into the store.

use std::collections::{BTreeMap, BTreeSet};

use cloudinv_core::error::{InventoryError, InventoryResult};
use cloudinv_core::models::resource::{CloudResource, ResourceKind, Tags};
use cloudinv_core::repository::ResourceRepository;
use cloudinv_provider::{CredentialResolver, ResourceTagger};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

pub const MAX_TAG_KEY_LEN: usize = 128;
pub const MAX_TAG_VALUE_LEN: usize = 256;
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// One failed resource, group or lookup.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationFailure {
    pub kind: Option<ResourceKind>,
    pub region: Option<String>,
    pub resource_id: Option<Uuid>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemediationReport {
    /// Resources whose provider tags were written.
    pub success: u64,
    pub failed: u64,
    pub errors: Vec<RemediationFailure>,
}

impl RemediationReport {
    fn fail(
        &mut self,
        count: u64,
        kind: Option<ResourceKind>,
        region: Option<&str>,
        resource_id: Option<Uuid>,
        error: impl Into<String>,
    ) {
        self.failed += count;
        self.errors.push(RemediationFailure {
            kind,
            region: region.map(str::to_string),
            resource_id,
            error: error.into(),
        });
    }
}

/// Validate a tag map before anything touches the provider.
pub fn validate_tags(tags: &Tags) -> Result<(), EngineError> {
    if tags.is_empty() {
        return Err(EngineError::EmptyTagSet);
    }
    for (key, value) in tags {
        let reason = if key.trim().is_empty() {
            Some("must not be empty".to_string())
        } else if key.chars().count() > MAX_TAG_KEY_LEN {
            Some(format!("longer than {MAX_TAG_KEY_LEN} characters"))
        } else if key.to_ascii_lowercase().starts_with(RESERVED_TAG_PREFIX) {
            Some(format!("the '{RESERVED_TAG_PREFIX}' prefix is reserved"))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(EngineError::InvalidTagKey {
                key: key.clone(),
                reason,
            });
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(EngineError::InvalidTagValue {
                key: key.clone(),
                reason: format!("longer than {MAX_TAG_VALUE_LEN} characters"),
            });
        }
    }
    Ok(())
}

fn merged(base: &Tags, tags: &Tags) -> Tags {
    let mut out = base.clone();
    out.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}

#[derive(Clone)]
pub struct RemediationExecutor<R: ResourceRepository> {
    resources: R,
    resolver: CredentialResolver,
}

impl<R: ResourceRepository> RemediationExecutor<R> {
    pub fn new(resources: R, resolver: CredentialResolver) -> Self {
        Self {
            resources,
            resolver,
        }
    }

    pub async fn apply_tags(
        &self,
        tenant_id: Uuid,
        resource_ids: &[Uuid],
        tags: Tags,
    ) -> InventoryResult<RemediationReport> {
        // 1. Reject malformed input before any provider call.
        if resource_ids.is_empty() {
            return Err(EngineError::EmptyResourceList.into());
        }
        validate_tags(&tags)?;

        // 2. Resolve credentials; absence is a hard rejection here.
        let clients = self.resolver.resolve(tenant_id).await?;
        if !clients.enabled {
            return Err(InventoryError::CredentialsNotConfigured { tenant_id });
        }

        // 3. Load the targets; unknown ids fail individually.
        let ids: Vec<Uuid> = resource_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = self.resources.get_many(tenant_id, &ids).await?;

        let mut report = RemediationReport::default();
        let known: BTreeSet<Uuid> = found.iter().map(|r| r.id).collect();
        for id in ids.iter().filter(|id| !known.contains(id)) {
            report.fail(1, None, None, Some(*id), "resource not found");
        }

        // 4. Group by (kind, region) and apply group by group.
        let mut groups: BTreeMap<(ResourceKind, String), Vec<CloudResource>> = BTreeMap::new();
        for resource in found {
            groups
                .entry((resource.kind, resource.region.clone()))
                .or_default()
                .push(resource);
        }

        for ((kind, region), members) in &groups {
            let Some(tagger) = clients.registry().tagger(*kind) else {
                report.fail(
                    members.len() as u64,
                    Some(*kind),
                    Some(region.as_str()),
                    None,
                    "no tagger registered for this kind",
                );
                continue;
            };

            if tagger.supports_batch() {
                self.apply_batch(tenant_id, tagger.as_ref(), region, members, &tags, &mut report)
                    .await;
            } else {
                for resource in members {
                    self.apply_single(
                        tenant_id,
                        tagger.as_ref(),
                        region,
                        resource,
                        &tags,
                        &mut report,
                    )
                    .await;
                }
            }
        }

        info!(
            %tenant_id,
            requested = resource_ids.len(),
            success = report.success,
            failed = report.failed,
            "Tag remediation finished"
        );

        Ok(report)
    }

    /// One provider call for the whole group. Batch APIs add or
    /// overwrite keys, so only the new tags are sent; the stored map is
    /// merged for the mirror.
    async fn apply_batch(
        &self,
        tenant_id: Uuid,
        tagger: &dyn ResourceTagger,
        region: &str,
        members: &[CloudResource],
        tags: &Tags,
        report: &mut RemediationReport,
    ) {
        let kind = tagger.kind();
        let targets: Vec<&CloudResource> = members.iter().collect();

        if let Err(e) = tagger.write_tags(region, &targets, tags).await {
            warn!(%tenant_id, %kind, region, error = %e, "Tag group failed");
            report.fail(members.len() as u64, Some(kind), Some(region), None, e.to_string());
            return;
        }

        for resource in members {
            self.mirror(tenant_id, resource, merged(&resource.tags, tags), report)
                .await;
        }
    }

    async fn apply_single(
        &self,
        tenant_id: Uuid,
        tagger: &dyn ResourceTagger,
        region: &str,
        resource: &CloudResource,
        tags: &Tags,
        report: &mut RemediationReport,
    ) {
        let kind = tagger.kind();

        let base = if tagger.reads_tags() {
            match tagger.read_tags(region, resource).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(%tenant_id, resource_id = %resource.id, error = %e, "Reading tags failed");
                    report.fail(1, Some(kind), Some(region), Some(resource.id), e.to_string());
                    return;
                }
            }
        } else {
            resource.tags.clone()
        };
        let merged = merged(&base, tags);

        if let Err(e) = tagger.write_tags(region, &[resource], &merged).await {
            warn!(%tenant_id, resource_id = %resource.id, error = %e, "Writing tags failed");
            report.fail(1, Some(kind), Some(region), Some(resource.id), e.to_string());
            return;
        }

        self.mirror(tenant_id, resource, merged, report).await;
    }

    /// Copy the provider-side result into the store.
    async fn mirror(
        &self,
        tenant_id: Uuid,
        resource: &CloudResource,
        tags: Tags,
        report: &mut RemediationReport,
    ) {
        match self.resources.update_tags(tenant_id, resource.id, tags).await {
            Ok(_) => report.success += 1,
            Err(e) => report.fail(
                1,
                Some(resource.kind),
                Some(resource.region.as_str()),
                Some(resource.id),
                format!("tags applied but inventory update failed: {e}"),
            ),
        }
    }
}
