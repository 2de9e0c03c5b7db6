//! SurrealDB implementation of [`DiscoveryJobRepository`].
//!
//! State transitions are conditional updates: the `WHERE status = ...`
//! guard makes the database refuse to move a job out of a terminal
//! state, even if two finalizers race.

use cloudinv_core::error::{InventoryError, InventoryResult};
use cloudinv_core::models::discovery_job::{
    CreateDiscoveryJob, DiscoveryJob, JobOutcome, JobStatus,
};
use cloudinv_core::models::resource::ResourceKind;
use cloudinv_core::repository::DiscoveryJobRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct JobRow {
    tenant_id: String,
    status: String,
    triggered_by: String,
    requested_kinds: Vec<String>,
    requested_regions: Vec<String>,
    resources_created: u64,
    resources_updated: u64,
    resources_unchanged: u64,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct JobRowWithId {
    record_id: String,
    tenant_id: String,
    status: String,
    triggered_by: String,
    requested_kinds: Vec<String>,
    requested_regions: Vec<String>,
    resources_created: u64,
    resources_updated: u64,
    resources_unchanged: u64,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self, id: Uuid) -> Result<DiscoveryJob, DbError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
        let requested_kinds = self
            .requested_kinds
            .iter()
            .map(|k| k.parse::<ResourceKind>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::Decode)?;
        Ok(DiscoveryJob {
            id,
            tenant_id,
            status: self.status.parse().map_err(DbError::Decode)?,
            trigger: self.triggered_by.parse().map_err(DbError::Decode)?,
            requested_kinds,
            requested_regions: self.requested_regions,
            resources_created: self.resources_created,
            resources_updated: self.resources_updated,
            resources_unchanged: self.resources_unchanged,
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        })
    }
}

impl JobRowWithId {
    fn try_into_job(self) -> Result<DiscoveryJob, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        JobRow {
            tenant_id: self.tenant_id,
            status: self.status,
            triggered_by: self.triggered_by,
            requested_kinds: self.requested_kinds,
            requested_regions: self.requested_regions,
            resources_created: self.resources_created,
            resources_updated: self.resources_updated,
            resources_unchanged: self.resources_unchanged,
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
        .into_job(id)
    }
}

/// SurrealDB implementation of the discovery job repository.
#[derive(Clone)]
pub struct SurrealDiscoveryJobRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDiscoveryJobRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Explain why a guarded update matched no row.
    async fn transition_error(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        target: JobStatus,
    ) -> InventoryError {
        match self.get_by_id(tenant_id, id).await {
            Ok(job) => InventoryError::InvalidTransition {
                entity: "discovery_job".into(),
                id: id.to_string(),
                reason: format!("cannot move from {} to {}", job.status, target),
            },
            Err(e) => e,
        }
    }
}

impl<C: Connection> DiscoveryJobRepository for SurrealDiscoveryJobRepository<C> {
    async fn create(&self, input: CreateDiscoveryJob) -> InventoryResult<DiscoveryJob> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let (status, started_at) = if input.start_running {
            (JobStatus::Running, Some(Utc::now()))
        } else {
            (JobStatus::Pending, None)
        };
        let kinds: Vec<String> = input
            .requested_kinds
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();

        let result = self
            .db
            .query(
                "CREATE type::record('discovery_job', $id) SET \
                 tenant_id = $tenant_id, \
                 status = $status, \
                 triggered_by = $triggered_by, \
                 requested_kinds = $requested_kinds, \
                 requested_regions = [], \
                 started_at = $started_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("status", status.as_str()))
            .bind(("triggered_by", input.trigger.as_str()))
            .bind(("requested_kinds", kinds))
            .bind(("started_at", started_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "discovery_job".into(),
            id: id_str,
        })?;

        row.into_job(id).map_err(Into::into)
    }

    async fn mark_running(&self, tenant_id: Uuid, id: Uuid) -> InventoryResult<DiscoveryJob> {
        let result = self
            .db
            .query(
                "UPDATE type::record('discovery_job', $id) \
                 SET status = 'Running', started_at = time::now() \
                 WHERE tenant_id = $tenant_id AND status = 'Pending'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => row.into_job(id).map_err(Into::into),
            None => Err(self
                .transition_error(tenant_id, id, JobStatus::Running)
                .await),
        }
    }

    async fn finalize(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        outcome: JobOutcome,
    ) -> InventoryResult<DiscoveryJob> {
        let status = outcome.status();

        let result = self
            .db
            .query(
                "UPDATE type::record('discovery_job', $id) SET \
                 status = $status, \
                 requested_regions = $requested_regions, \
                 resources_created = $resources_created, \
                 resources_updated = $resources_updated, \
                 resources_unchanged = $resources_unchanged, \
                 error_message = $error_message, \
                 completed_at = time::now() \
                 WHERE tenant_id = $tenant_id AND status = 'Running'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", status.as_str()))
            .bind(("requested_regions", outcome.requested_regions.clone()))
            .bind(("resources_created", outcome.resources_created))
            .bind(("resources_updated", outcome.resources_updated))
            .bind(("resources_unchanged", outcome.resources_unchanged))
            .bind(("error_message", outcome.error_message()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => row.into_job(id).map_err(Into::into),
            None => Err(self.transition_error(tenant_id, id, status).await),
        }
    }

    async fn abandon(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: String,
    ) -> InventoryResult<DiscoveryJob> {
        let result = self
            .db
            .query(
                "UPDATE type::record('discovery_job', $id) SET \
                 status = 'Failed', \
                 error_message = $error_message, \
                 completed_at = time::now() \
                 WHERE tenant_id = $tenant_id AND status = 'Pending'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("error_message", reason))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => row.into_job(id).map_err(Into::into),
            None => Err(self
                .transition_error(tenant_id, id, JobStatus::Failed)
                .await),
        }
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> InventoryResult<DiscoveryJob> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('discovery_job', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "discovery_job".into(),
            id: id_str,
        })?;

        row.into_job(id).map_err(Into::into)
    }

    async fn list(&self, tenant_id: Uuid, limit: u64) -> InventoryResult<Vec<DiscoveryJob>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM discovery_job \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at DESC \
                 LIMIT $limit",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_job())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
