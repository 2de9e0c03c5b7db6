//! Inventory service: the inbound facade over discovery, inventory
//! reads, compliance, orphan detection and tag remediation.

use std::sync::Arc;

use chrono::Utc;
use cloudinv_core::error::InventoryResult;
use cloudinv_core::models::compliance::{ResourceIssue, ScanSummary};
use cloudinv_core::models::discovery_job::{DiscoveryJob, JobTrigger};
use cloudinv_core::models::orphan::OrphanReport;
use cloudinv_core::models::resource::{CloudResource, Tags};
use cloudinv_core::models::tag_policy::{TagPolicy, TenantTagPolicy};
use cloudinv_core::repository::{
    DiscoveryJobRepository, InventoryStats, PaginatedResult, Pagination, ResourceFilter,
    ResourceRepository, TagPolicyRepository,
};
use cloudinv_provider::CredentialResolver;
use tracing::{error, info};
use uuid::Uuid;

use crate::compliance::{ComplianceScanner, validate_policy};
use crate::config::EngineConfig;
use crate::discovery::DiscoveryOrchestrator;
use crate::orphan::OrphanDetector;
use crate::remediation::{RemediationExecutor, RemediationReport};
use crate::tasks::BackgroundTasks;

/// Inventory service.
///
/// Generic over repository implementations so that the engine has no
/// dependency on the database crate.
pub struct InventoryService<R, J, P>
where
    R: ResourceRepository,
    J: DiscoveryJobRepository,
    P: TagPolicyRepository,
{
    resources: R,
    jobs: J,
    policies: P,
    orchestrator: Arc<DiscoveryOrchestrator<R, J, P>>,
    scanner: ComplianceScanner<R, P>,
    remediation: RemediationExecutor<R>,
    orphans: OrphanDetector,
    tasks: BackgroundTasks,
    config: EngineConfig,
}

impl<R, J, P> InventoryService<R, J, P>
where
    R: ResourceRepository + Clone + 'static,
    J: DiscoveryJobRepository + Clone + 'static,
    P: TagPolicyRepository + Clone + 'static,
{
    pub fn new(
        resources: R,
        jobs: J,
        policies: P,
        resolver: CredentialResolver,
        config: EngineConfig,
    ) -> Self {
        let orchestrator = DiscoveryOrchestrator::new(
            resources.clone(),
            jobs.clone(),
            policies.clone(),
            resolver.clone(),
            config.clone(),
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            scanner: ComplianceScanner::new(resources.clone(), policies.clone()),
            remediation: RemediationExecutor::new(resources.clone(), resolver),
            orphans: OrphanDetector::new(config.orphan.clone()),
            tasks: BackgroundTasks::new(),
            resources,
            jobs,
            policies,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------

    /// Enqueue a manual run and return its job id without waiting for it.
    pub async fn start_discovery(&self, tenant_id: Uuid) -> InventoryResult<Uuid> {
        let job = self.orchestrator.enqueue(tenant_id, JobTrigger::Manual).await?;
        let job_id = job.id;

        let orchestrator = Arc::clone(&self.orchestrator);
        self.tasks.spawn(async move {
            if let Err(e) = orchestrator.run_pending(job).await {
                error!(%tenant_id, %job_id, error = %e, "Background discovery failed");
            }
        });

        info!(%tenant_id, %job_id, "Discovery enqueued");
        Ok(job_id)
    }

    /// Run discovery to completion and return the finalized job.
    pub async fn run_discovery(
        &self,
        tenant_id: Uuid,
        trigger: JobTrigger,
    ) -> InventoryResult<DiscoveryJob> {
        self.orchestrator.run(tenant_id, trigger).await
    }

    pub async fn get_job(&self, tenant_id: Uuid, job_id: Uuid) -> InventoryResult<DiscoveryJob> {
        self.jobs.get_by_id(tenant_id, job_id).await
    }

    /// Most recent jobs first. `limit` is clamped to `1..=max_job_list`.
    pub async fn list_jobs(&self, tenant_id: Uuid, limit: u64) -> InventoryResult<Vec<DiscoveryJob>> {
        let limit = limit.clamp(1, self.config.max_job_list.max(1));
        self.jobs.list(tenant_id, limit).await
    }

    // -----------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------

    pub async fn list_resources(
        &self,
        tenant_id: Uuid,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> InventoryResult<PaginatedResult<CloudResource>> {
        self.resources.list(tenant_id, filter, pagination).await
    }

    pub async fn get_resource(&self, tenant_id: Uuid, id: Uuid) -> InventoryResult<CloudResource> {
        self.resources.get_by_id(tenant_id, id).await
    }

    pub async fn get_stats(&self, tenant_id: Uuid) -> InventoryResult<InventoryStats> {
        self.resources.stats(tenant_id).await
    }

    // -----------------------------------------------------------------
    // Compliance
    // -----------------------------------------------------------------

    pub async fn get_compliance_issues(&self, tenant_id: Uuid) -> InventoryResult<Vec<ResourceIssue>> {
        self.scanner.issues(tenant_id).await
    }

    pub async fn scan_compliance(&self, tenant_id: Uuid) -> InventoryResult<ScanSummary> {
        self.scanner.scan_tenant(tenant_id).await
    }

    pub async fn get_tag_policy(&self, tenant_id: Uuid) -> InventoryResult<TagPolicy> {
        self.scanner.policy(tenant_id).await
    }

    /// Validate and store the tenant's tag policy. Stored snapshots are
    /// refreshed on the next scan.
    pub async fn set_tag_policy(
        &self,
        tenant_id: Uuid,
        policy: TagPolicy,
    ) -> InventoryResult<TenantTagPolicy> {
        validate_policy(&policy)?;
        let stored = self.policies.put(tenant_id, policy).await?;
        info!(
            %tenant_id,
            required_tags = stored.policy.required_tags.len(),
            "Tag policy updated"
        );
        Ok(stored)
    }

    // -----------------------------------------------------------------
    // Cost and remediation
    // -----------------------------------------------------------------

    pub async fn get_orphaned(&self, tenant_id: Uuid) -> InventoryResult<OrphanReport> {
        let resources = self.resources.list_all(tenant_id).await?;
        Ok(self.orphans.detect(&resources, Utc::now()))
    }

    pub async fn apply_tags(
        &self,
        tenant_id: Uuid,
        resource_ids: &[Uuid],
        tags: Tags,
    ) -> InventoryResult<RemediationReport> {
        self.remediation.apply_tags(tenant_id, resource_ids, tags).await
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Wait for every background discovery run started so far.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }

    /// Drain in-flight background runs. Nothing is cancelled.
    pub async fn shutdown(&self) {
        info!(in_flight = self.tasks.len(), "Waiting for background discovery runs");
        self.tasks.shutdown().await;
    }
}
