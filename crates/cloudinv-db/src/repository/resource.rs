//! SurrealDB implementation of [`ResourceRepository`], the inventory
//! store.
//!
//! Rows are addressed by `CloudResource::record_id(tenant, provider_id)`
//! and additionally guarded by a UNIQUE index on
//! `(tenant_id, provider_id)`, so concurrent upserts of the same key
//! collapse onto one row without any application-level lock.

use cloudinv_core::error::{InventoryError, InventoryResult};
use cloudinv_core::models::compliance::{ComplianceIssue, Severity};
use cloudinv_core::models::resource::{
    CloudResource, NewResource, ResourceKind, ResourceStatus, Tags, UpsertChange, UpsertOutcome,
};
use cloudinv_core::repository::{
    InventoryStats, PaginatedResult, Pagination, ResourceFilter, ResourceRepository,
};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    tenant_id: String,
    provider_id: String,
    short_id: String,
    name: String,
    resource_kind: String,
    region: String,
    tags: serde_json::Value,
    metadata: serde_json::Value,
    status: String,
    estimated_monthly_cost: f64,
    actual_monthly_cost: Option<f64>,
    is_encrypted: bool,
    is_public: bool,
    has_backup: bool,
    compliance_issues: serde_json::Value,
    first_discovered_at: DateTime<Utc>,
    last_synced_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ResourceRowWithId {
    record_id: String,
    tenant_id: String,
    provider_id: String,
    short_id: String,
    name: String,
    resource_kind: String,
    region: String,
    tags: serde_json::Value,
    metadata: serde_json::Value,
    status: String,
    estimated_monthly_cost: f64,
    actual_monthly_cost: Option<f64>,
    is_encrypted: bool,
    is_public: bool,
    has_backup: bool,
    compliance_issues: serde_json::Value,
    first_discovered_at: DateTime<Utc>,
    last_synced_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceRow {
    fn into_resource(self, id: Uuid) -> Result<CloudResource, DbError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
        Ok(CloudResource {
            id,
            tenant_id,
            provider_id: self.provider_id,
            short_id: self.short_id,
            name: self.name,
            kind: self.resource_kind.parse().map_err(DbError::Decode)?,
            region: self.region,
            tags: decode_json(self.tags, "tags")?,
            metadata: decode_json(self.metadata, "metadata")?,
            status: self.status.parse().map_err(DbError::Decode)?,
            estimated_monthly_cost: self.estimated_monthly_cost,
            actual_monthly_cost: self.actual_monthly_cost,
            is_encrypted: self.is_encrypted,
            is_public: self.is_public,
            has_backup: self.has_backup,
            compliance_issues: decode_json(self.compliance_issues, "compliance_issues")?,
            first_discovered_at: self.first_discovered_at,
            last_synced_at: self.last_synced_at,
            updated_at: self.updated_at,
        })
    }
}

impl ResourceRowWithId {
    fn try_into_resource(self) -> Result<CloudResource, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        ResourceRow {
            tenant_id: self.tenant_id,
            provider_id: self.provider_id,
            short_id: self.short_id,
            name: self.name,
            resource_kind: self.resource_kind,
            region: self.region,
            tags: self.tags,
            metadata: self.metadata,
            status: self.status,
            estimated_monthly_cost: self.estimated_monthly_cost,
            actual_monthly_cost: self.actual_monthly_cost,
            is_encrypted: self.is_encrypted,
            is_public: self.is_public,
            has_backup: self.has_backup,
            compliance_issues: self.compliance_issues,
            first_discovered_at: self.first_discovered_at,
            last_synced_at: self.last_synced_at,
            updated_at: self.updated_at,
        }
        .into_resource(id)
    }
}

/// Projection used to build [`InventoryStats`].
#[derive(Debug, SurrealValue)]
struct StatsRow {
    resource_kind: String,
    region: String,
    status: String,
    estimated_monthly_cost: f64,
    actual_monthly_cost: Option<f64>,
    is_encrypted: bool,
    is_public: bool,
    compliance_issues: serde_json::Value,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn decode_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("{field}: {e}")))
}

fn encode_json<T: serde::Serialize>(value: &T, field: &str) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Query(format!("{field}: {e}")))
}

/// WHERE-clause fragments for a [`ResourceFilter`]. Always starts with
/// the tenant guard.
fn filter_clauses(filter: &ResourceFilter) -> Vec<&'static str> {
    let mut clauses = vec!["tenant_id = $tenant_id"];
    if filter.kind.is_some() {
        clauses.push("resource_kind = $resource_kind");
    }
    if filter.region.is_some() {
        clauses.push("region = $region");
    }
    if filter.status.is_some() {
        clauses.push("status = $status");
    }
    if filter.is_encrypted.is_some() {
        clauses.push("is_encrypted = $is_encrypted");
    }
    if filter.is_public.is_some() {
        clauses.push("is_public = $is_public");
    }
    match filter.has_issues {
        Some(true) => clauses.push("array::len(compliance_issues) > 0"),
        Some(false) => clauses.push("array::len(compliance_issues) = 0"),
        None => {}
    }
    if filter.search.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        clauses.push(
            "(string::contains(string::lowercase(name), $search) \
             OR string::contains(string::lowercase(provider_id), $search) \
             OR string::contains(string::lowercase(short_id), $search))",
        );
    }
    clauses
}

/// SurrealDB implementation of the inventory store.
#[derive(Clone)]
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CloudResource>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('cloud_resource', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;

        let rows: Vec<ResourceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_resource(id))
            .transpose()
    }

    async fn write(
        &self,
        id: Uuid,
        input: &NewResource,
        updated_at: DateTime<Utc>,
    ) -> Result<CloudResource, DbError> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPSERT type::record('cloud_resource', $id) SET \
                 tenant_id = $tenant_id, \
                 provider_id = $provider_id, \
                 short_id = $short_id, \
                 name = $name, \
                 resource_kind = $resource_kind, \
                 region = $region, \
                 tags = $tags, \
                 metadata = $metadata, \
                 status = $status, \
                 estimated_monthly_cost = $estimated_monthly_cost, \
                 actual_monthly_cost = $actual_monthly_cost, \
                 is_encrypted = $is_encrypted, \
                 is_public = $is_public, \
                 has_backup = $has_backup, \
                 last_synced_at = time::now(), \
                 updated_at = $updated_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("provider_id", input.provider_id.clone()))
            .bind(("short_id", input.short_id.clone()))
            .bind(("name", input.name.clone()))
            .bind(("resource_kind", input.kind.as_str()))
            .bind(("region", input.region.clone()))
            .bind(("tags", encode_json(&input.tags, "tags")?))
            .bind(("metadata", encode_json(&input.metadata, "metadata")?))
            .bind(("status", input.status.as_str()))
            .bind(("estimated_monthly_cost", input.estimated_monthly_cost))
            .bind(("actual_monthly_cost", input.actual_monthly_cost))
            .bind(("is_encrypted", input.is_encrypted))
            .bind(("is_public", input.is_public))
            .bind(("has_backup", input.has_backup))
            .bind(("updated_at", updated_at))
            .await?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "cloud_resource".into(),
            id: id_str,
        })?;

        row.into_resource(id)
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn upsert(&self, input: NewResource) -> InventoryResult<UpsertOutcome> {
        let id = CloudResource::record_id(input.tenant_id, &input.provider_id);

        let existing = self
            .find(input.tenant_id, id)
            .await
            .map_err(|e| InventoryError::StoreWrite(e.to_string()))?;

        let (change, updated_at) = match &existing {
            None => (UpsertChange::Created, Utc::now()),
            Some(current) if current.differs_from(&input) => (UpsertChange::Updated, Utc::now()),
            Some(current) => (UpsertChange::Unchanged, current.updated_at),
        };

        let resource = self
            .write(id, &input, updated_at)
            .await
            .map_err(|e| InventoryError::StoreWrite(e.to_string()))?;

        debug!(
            tenant_id = %resource.tenant_id,
            provider_id = %resource.provider_id,
            change = ?change,
            "Upserted resource"
        );

        Ok(UpsertOutcome { resource, change })
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> InventoryResult<CloudResource> {
        self.find(tenant_id, id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "cloud_resource".into(),
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn get_by_provider_id(
        &self,
        tenant_id: Uuid,
        provider_id: &str,
    ) -> InventoryResult<CloudResource> {
        let provider_id_owned = provider_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM cloud_resource \
                 WHERE tenant_id = $tenant_id AND provider_id = $provider_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("provider_id", provider_id_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "cloud_resource".into(),
            id: format!("provider_id={provider_id_owned}"),
        })?;

        row.try_into_resource().map_err(Into::into)
    }

    async fn get_many(&self, tenant_id: Uuid, ids: &[Uuid]) -> InventoryResult<Vec<CloudResource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM cloud_resource \
                 WHERE tenant_id = $tenant_id AND meta::id(id) IN $ids",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> InventoryResult<PaginatedResult<CloudResource>> {
        let where_clause = filter_clauses(&filter).join(" AND ");
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let query = format!(
            "SELECT count() AS total FROM cloud_resource \
             WHERE {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM cloud_resource \
             WHERE {where_clause} \
             ORDER BY resource_kind ASC, name ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(kind) = filter.kind {
            builder = builder.bind(("resource_kind", kind.as_str()));
        }
        if let Some(region) = filter.region {
            builder = builder.bind(("region", region));
        }
        if let Some(status) = filter.status {
            builder = builder.bind(("status", status.as_str()));
        }
        if let Some(is_encrypted) = filter.is_encrypted {
            builder = builder.bind(("is_encrypted", is_encrypted));
        }
        if let Some(is_public) = filter.is_public {
            builder = builder.bind(("is_public", is_public));
        }
        if let Some(search) = search {
            builder = builder.bind(("search", search));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<ResourceRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(&self, tenant_id: Uuid) -> InventoryResult<Vec<CloudResource>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM cloud_resource \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY first_discovered_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn stats(&self, tenant_id: Uuid) -> InventoryResult<InventoryStats> {
        let mut result = self
            .db
            .query(
                "SELECT resource_kind, region, status, estimated_monthly_cost, \
                 actual_monthly_cost, is_encrypted, is_public, compliance_issues \
                 FROM cloud_resource WHERE tenant_id = $tenant_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StatsRow> = result.take(0).map_err(DbError::from)?;

        let mut stats = InventoryStats::default();
        for row in rows {
            let kind: ResourceKind = row.resource_kind.parse().map_err(DbError::Decode)?;
            let status: ResourceStatus = row.status.parse().map_err(DbError::Decode)?;
            let issues: Vec<ComplianceIssue> =
                decode_json(row.compliance_issues, "compliance_issues")?;

            stats.total += 1;
            *stats.by_kind.entry(kind).or_default() += 1;
            *stats.by_region.entry(row.region).or_default() += 1;
            *stats.by_status.entry(status).or_default() += 1;
            stats.estimated_monthly_cost += row.estimated_monthly_cost;
            stats.actual_monthly_cost += row.actual_monthly_cost.unwrap_or(0.0);
            if row.is_encrypted {
                stats.encrypted += 1;
            }
            if row.is_public {
                stats.public += 1;
            }
            if !issues.is_empty() {
                stats.resources_with_issues += 1;
            }
            for issue in issues {
                *stats.issues_by_severity.entry(issue.severity).or_default() += 1;
                *stats.issues_by_category.entry(issue.category).or_default() += 1;
            }
        }

        // Keep every severity present so callers can render a fixed table.
        for severity in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ] {
            stats.issues_by_severity.entry(severity).or_default();
        }

        Ok(stats)
    }

    async fn set_compliance_issues(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        issues: Vec<ComplianceIssue>,
    ) -> InventoryResult<()> {
        let id_str = id.to_string();
        let issues = encode_json(&issues, "compliance_issues")?;

        let result = self
            .db
            .query(
                "UPDATE type::record('cloud_resource', $id) \
                 SET compliance_issues = $issues \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("issues", issues))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "cloud_resource".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn update_tags(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        tags: Tags,
    ) -> InventoryResult<CloudResource> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('cloud_resource', $id) \
                 SET tags = $tags, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("tags", encode_json(&tags, "tags")?))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "cloud_resource".into(),
            id: id_str,
        })?;

        row.into_resource(id).map_err(Into::into)
    }

    async fn delete_stale(&self, tenant_id: Uuid, cutoff: DateTime<Utc>) -> InventoryResult<u64> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM cloud_resource \
                 WHERE tenant_id = $tenant_id AND last_synced_at < $cutoff \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        if total > 0 {
            self.db
                .query(
                    "DELETE cloud_resource \
                     WHERE tenant_id = $tenant_id AND last_synced_at < $cutoff",
                )
                .bind(("tenant_id", tenant_id_str))
                .bind(("cutoff", cutoff))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(|e| DbError::Query(e.to_string()))?;
        }

        Ok(total)
    }
}
