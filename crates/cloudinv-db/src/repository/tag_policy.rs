//! SurrealDB implementation of [`TagPolicyRepository`].
//!
//! One row per tenant, keyed by the tenant id itself.

use cloudinv_core::error::InventoryResult;
use cloudinv_core::models::tag_policy::{TagPolicy, TenantTagPolicy};
use cloudinv_core::repository::TagPolicyRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TagPolicyRow {
    policy: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl TagPolicyRow {
    fn into_policy(self, tenant_id: Uuid) -> Result<TenantTagPolicy, DbError> {
        let policy: TagPolicy = serde_json::from_value(self.policy)
            .map_err(|e| DbError::Decode(format!("tag policy: {e}")))?;
        Ok(TenantTagPolicy {
            tenant_id,
            policy,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealTagPolicyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTagPolicyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TagPolicyRepository for SurrealTagPolicyRepository<C> {
    async fn get(&self, tenant_id: Uuid) -> InventoryResult<Option<TenantTagPolicy>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('tag_policy', $id)")
            .bind(("id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TagPolicyRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_policy(tenant_id))
            .transpose()
            .map_err(Into::into)
    }

    async fn put(&self, tenant_id: Uuid, policy: TagPolicy) -> InventoryResult<TenantTagPolicy> {
        let id_str = tenant_id.to_string();
        let policy_json = serde_json::to_value(&policy)
            .map_err(|e| DbError::Query(format!("tag policy: {e}")))?;

        let result = self
            .db
            .query(
                "UPSERT type::record('tag_policy', $id) SET \
                 tenant_id = $id, policy = $policy, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("policy", policy_json))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TagPolicyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tag_policy".into(),
            id: id_str,
        })?;

        row.into_policy(tenant_id).map_err(Into::into)
    }
}
