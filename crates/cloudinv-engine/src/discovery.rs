//! Discovery orchestration.
//!
//! One job per run: resolve credentials, drive each kind discoverer
//! across the tenant's regions, upsert what they return, finalize the
//! job. Kinds run sequentially and fail independently. The run body is
//! polled under `catch_unwind`, so even a panic ends with the job
//! finalized as failed.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use cloudinv_core::error::{InventoryError, InventoryResult};
use cloudinv_core::models::discovery_job::{
    CreateDiscoveryJob, DiscoveryJob, JobOutcome, JobTrigger,
};
use cloudinv_core::models::resource::UpsertChange;
use cloudinv_core::repository::{DiscoveryJobRepository, ResourceRepository, TagPolicyRepository};
use cloudinv_provider::{CredentialResolver, DiscoveryContext};
use futures::FutureExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compliance::ComplianceScanner;
use crate::config::EngineConfig;

pub const CREDENTIALS_NOT_CONFIGURED: &str = "cloud credentials not configured";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct DiscoveryOrchestrator<R, J, P>
where
    R: ResourceRepository,
    J: DiscoveryJobRepository,
    P: TagPolicyRepository,
{
    resources: R,
    jobs: J,
    resolver: CredentialResolver,
    scanner: ComplianceScanner<R, P>,
    config: EngineConfig,
}

impl<R, J, P> DiscoveryOrchestrator<R, J, P>
where
    R: ResourceRepository + Clone,
    J: DiscoveryJobRepository,
    P: TagPolicyRepository,
{
    pub fn new(
        resources: R,
        jobs: J,
        policies: P,
        resolver: CredentialResolver,
        config: EngineConfig,
    ) -> Self {
        Self {
            scanner: ComplianceScanner::new(resources.clone(), policies),
            resources,
            jobs,
            resolver,
            config,
        }
    }

    /// Create a job directly in `Running` and run it to completion.
    pub async fn run(&self, tenant_id: Uuid, trigger: JobTrigger) -> InventoryResult<DiscoveryJob> {
        let job = self.jobs.create(self.job_request(tenant_id, trigger, true)).await?;
        self.execute(job).await
    }

    /// Record a `Pending` job for a later [`run_pending`](Self::run_pending).
    pub async fn enqueue(
        &self,
        tenant_id: Uuid,
        trigger: JobTrigger,
    ) -> InventoryResult<DiscoveryJob> {
        self.jobs.create(self.job_request(tenant_id, trigger, false)).await
    }

    /// Start and run an enqueued job. If the store fails while starting
    /// it, the job is recorded as failed instead of staying `Pending`.
    pub async fn run_pending(&self, job: DiscoveryJob) -> InventoryResult<DiscoveryJob> {
        let (tenant_id, job_id) = (job.tenant_id, job.id);
        let job = match self.jobs.mark_running(tenant_id, job_id).await {
            Ok(job) => job,
            Err(e @ InventoryError::InvalidTransition { .. }) => return Err(e),
            Err(e) => {
                warn!(%tenant_id, %job_id, error = %e, "Discovery could not start");
                let reason = format!("discovery could not start: {e}");
                if let Err(abandon_err) = self.jobs.abandon(tenant_id, job_id, reason).await {
                    warn!(%tenant_id, %job_id, error = %abandon_err, "Failed to mark job as failed");
                }
                return Err(e);
            }
        };
        self.execute(job).await
    }

    fn job_request(
        &self,
        tenant_id: Uuid,
        trigger: JobTrigger,
        start_running: bool,
    ) -> CreateDiscoveryJob {
        CreateDiscoveryJob {
            tenant_id,
            trigger,
            requested_kinds: self.config.kinds.clone(),
            start_running,
        }
    }

    async fn execute(&self, job: DiscoveryJob) -> InventoryResult<DiscoveryJob> {
        info!(
            tenant_id = %job.tenant_id,
            job_id = %job.id,
            trigger = %job.trigger.as_str(),
            "Discovery started"
        );

        let outcome = match AssertUnwindSafe(self.collect(&job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(job_id = %job.id, panic = %message, "Discovery run panicked");
                JobOutcome::failed(format!("discovery aborted: {message}"))
            }
        };

        let finished = self.jobs.finalize(job.tenant_id, job.id, outcome).await?;

        info!(
            tenant_id = %finished.tenant_id,
            job_id = %finished.id,
            status = %finished.status.as_str(),
            created = finished.resources_created,
            updated = finished.resources_updated,
            unchanged = finished.resources_unchanged,
            "Discovery finished"
        );

        if self.config.scan_after_discovery && finished.resources_seen() > 0 {
            if let Err(e) = self.scanner.scan_tenant(finished.tenant_id).await {
                warn!(
                    tenant_id = %finished.tenant_id,
                    error = %e,
                    "Compliance scan after discovery failed"
                );
            }
        }

        Ok(finished)
    }

    async fn collect(&self, job: &DiscoveryJob) -> JobOutcome {
        let tenant_id = job.tenant_id;

        // 1. Resolve credentials. A disabled bundle ends the job here.
        let clients = match self.resolver.resolve(tenant_id).await {
            Ok(clients) if clients.enabled => clients,
            Ok(_) => {
                info!(%tenant_id, job_id = %job.id, "Discovery skipped: credentials not configured");
                return JobOutcome::failed(CREDENTIALS_NOT_CONFIGURED);
            }
            Err(e) => {
                warn!(%tenant_id, job_id = %job.id, error = %e, "Credential resolution failed");
                return JobOutcome::failed(format!("credential resolution failed: {e}"));
            }
        };

        let mut outcome = JobOutcome {
            requested_regions: clients.regions.clone(),
            ..Default::default()
        };

        // 2. Each kind across each region, one after another.
        for kind in &job.requested_kinds {
            let Some(discoverer) = clients.registry().discoverer(*kind) else {
                outcome.errors.push(format!("{kind}: no discoverer registered"));
                continue;
            };

            for region in &clients.regions {
                let ctx = DiscoveryContext {
                    tenant_id,
                    account_id: clients.account_id.clone(),
                    region: region.clone(),
                };

                let found = match discoverer.discover(&ctx).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(%tenant_id, %kind, region = %region, error = %e, "Discovery failed");
                        outcome.errors.push(format!("{kind}/{region}: {e}"));
                        continue;
                    }
                };
                debug!(
                    %tenant_id,
                    %kind,
                    region = %region,
                    found = found.resources.len(),
                    skipped = found.skipped.len(),
                    "Discovered"
                );
                for e in &found.skipped {
                    outcome.errors.push(format!("{kind}/{region}: {e}"));
                }
                let records = found.resources;

                // 3. Upsert. A store failure abandons the rest of this
                //    kind and region only.
                for record in records {
                    match self.resources.upsert(record).await {
                        Ok(upserted) => match upserted.change {
                            UpsertChange::Created => outcome.resources_created += 1,
                            UpsertChange::Updated => outcome.resources_updated += 1,
                            UpsertChange::Unchanged => outcome.resources_unchanged += 1,
                        },
                        Err(e) => {
                            warn!(%tenant_id, %kind, region = %region, error = %e, "Upsert failed");
                            outcome.errors.push(format!("{kind}/{region}: {e}"));
                            break;
                        }
                    }
                }
            }
        }

        outcome
    }
}
