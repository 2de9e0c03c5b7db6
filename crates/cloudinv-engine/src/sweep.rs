//! Scheduled discovery sweep over every active tenant.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cloudinv_core::error::InventoryResult;
use cloudinv_core::models::discovery_job::{JobStatus, JobTrigger};
use cloudinv_core::repository::{
    DiscoveryJobRepository, ResourceRepository, TagPolicyRepository, TenantRepository,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::service::InventoryService;

/// Outcome of one pass over the active tenants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub tenants: u64,
    pub completed: u64,
    /// Runs that ended `Failed` or could not be started at all.
    pub failed: u64,
}

pub struct DiscoverySweeper<T, R, J, P>
where
    T: TenantRepository,
    R: ResourceRepository,
    J: DiscoveryJobRepository,
    P: TagPolicyRepository,
{
    tenants: T,
    service: Arc<InventoryService<R, J, P>>,
}

impl<T, R, J, P> DiscoverySweeper<T, R, J, P>
where
    T: TenantRepository,
    R: ResourceRepository + Clone + 'static,
    J: DiscoveryJobRepository + Clone + 'static,
    P: TagPolicyRepository + Clone + 'static,
{
    pub fn new(tenants: T, service: Arc<InventoryService<R, J, P>>) -> Self {
        Self { tenants, service }
    }

    /// Discover every active tenant, one after another.
    pub async fn sweep_once(&self) -> InventoryResult<SweepSummary> {
        let tenants = self.tenants.list_active().await?;
        let mut summary = SweepSummary::default();

        for tenant in tenants {
            summary.tenants += 1;
            match self.service.run_discovery(tenant.id, JobTrigger::Scheduled).await {
                Ok(job) if job.status == JobStatus::Completed => summary.completed += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    warn!(tenant_id = %tenant.id, error = %e, "Scheduled discovery could not run");
                    summary.failed += 1;
                }
            }
        }

        info!(
            tenants = summary.tenants,
            completed = summary.completed,
            failed = summary.failed,
            "Discovery sweep finished"
        );
        Ok(summary)
    }

    /// Sweep every `interval` until `shutdown` resolves. The first sweep
    /// starts immediately. A sweep in progress is finished, not cut short.
    pub async fn run(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = interval.as_secs(), "Discovery sweeper started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Listing active tenants failed");
                    }
                }
            }
        }
        info!("Discovery sweeper stopped");
    }
}
