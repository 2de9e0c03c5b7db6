//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InventoryResult;
use crate::models::{
    compliance::{ComplianceIssue, IssueCategory, Severity},
    discovery_job::{CreateDiscoveryJob, DiscoveryJob, JobOutcome},
    resource::{CloudResource, NewResource, ResourceKind, ResourceStatus, Tags, UpsertOutcome},
    tag_policy::{TagPolicy, TenantTagPolicy},
    tenant::{CreateTenant, Tenant, UpdateTenant},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = InventoryResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = InventoryResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = InventoryResult<Tenant>> + Send;
    /// All tenants with `active = true`, oldest first.
    fn list_active(&self) -> impl Future<Output = InventoryResult<Vec<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Inventory (tenant-scoped)
// ---------------------------------------------------------------------------

/// Query filters for inventory listings. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub region: Option<String>,
    pub status: Option<ResourceStatus>,
    pub is_encrypted: Option<bool>,
    pub is_public: Option<bool>,
    /// Only resources whose latest scan produced at least one issue.
    pub has_issues: Option<bool>,
    /// Case-insensitive substring match on name, provider id and short id.
    pub search: Option<String>,
}

/// Aggregate view over a tenant's inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total: u64,
    pub by_kind: BTreeMap<ResourceKind, u64>,
    pub by_region: BTreeMap<String, u64>,
    pub by_status: BTreeMap<ResourceStatus, u64>,
    pub estimated_monthly_cost: f64,
    pub actual_monthly_cost: f64,
    pub encrypted: u64,
    pub public: u64,
    pub resources_with_issues: u64,
    pub issues_by_severity: BTreeMap<Severity, u64>,
    pub issues_by_category: BTreeMap<IssueCategory, u64>,
}

pub trait ResourceRepository: Send + Sync {
    /// Insert on `(tenant_id, provider_id)`, or refresh the mutable
    /// fields of the existing row. `first_discovered_at` and the
    /// compliance snapshot are never touched by an upsert.
    fn upsert(
        &self,
        input: NewResource,
    ) -> impl Future<Output = InventoryResult<UpsertOutcome>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = InventoryResult<CloudResource>> + Send;
    fn get_by_provider_id(
        &self,
        tenant_id: Uuid,
        provider_id: &str,
    ) -> impl Future<Output = InventoryResult<CloudResource>> + Send;
    /// Fetch the given ids; unknown ids are silently skipped.
    fn get_many(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> impl Future<Output = InventoryResult<Vec<CloudResource>>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = InventoryResult<PaginatedResult<CloudResource>>> + Send;
    /// Every resource of a tenant, for whole-inventory passes.
    fn list_all(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = InventoryResult<Vec<CloudResource>>> + Send;
    fn stats(&self, tenant_id: Uuid) -> impl Future<Output = InventoryResult<InventoryStats>> + Send;
    /// Replace the compliance snapshot of a resource.
    fn set_compliance_issues(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        issues: Vec<ComplianceIssue>,
    ) -> impl Future<Output = InventoryResult<()>> + Send;
    /// Replace the stored tag map after a remediation write.
    fn update_tags(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        tags: Tags,
    ) -> impl Future<Output = InventoryResult<CloudResource>> + Send;
    /// Remove records not synced since `cutoff`. Returns the number removed.
    fn delete_stale(
        &self,
        tenant_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = InventoryResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Discovery jobs (append-only audit, tenant-scoped)
// ---------------------------------------------------------------------------

pub trait DiscoveryJobRepository: Send + Sync {
    fn create(
        &self,
        input: CreateDiscoveryJob,
    ) -> impl Future<Output = InventoryResult<DiscoveryJob>> + Send;
    /// `Pending -> Running`. Fails with `InvalidTransition` from any
    /// other state.
    fn mark_running(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = InventoryResult<DiscoveryJob>> + Send;
    /// `Running -> Completed | Failed`. Fails with `InvalidTransition`
    /// if the job is not running, so terminal states never change.
    fn finalize(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        outcome: JobOutcome,
    ) -> impl Future<Output = InventoryResult<DiscoveryJob>> + Send;
    /// `Pending -> Failed` for a job that could not be started.
    fn abandon(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: String,
    ) -> impl Future<Output = InventoryResult<DiscoveryJob>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = InventoryResult<DiscoveryJob>> + Send;
    /// Most recent jobs first.
    fn list(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = InventoryResult<Vec<DiscoveryJob>>> + Send;
}

// ---------------------------------------------------------------------------
// Tag policy (tenant-scoped configuration)
// ---------------------------------------------------------------------------

pub trait TagPolicyRepository: Send + Sync {
    /// `None` when the tenant never stored a policy.
    fn get(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = InventoryResult<Option<TenantTagPolicy>>> + Send;
    fn put(
        &self,
        tenant_id: Uuid,
        policy: TagPolicy,
    ) -> impl Future<Output = InventoryResult<TenantTagPolicy>> + Send;
}
