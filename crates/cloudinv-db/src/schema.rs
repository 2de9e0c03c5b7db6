//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Free-form maps (tags, per-kind
//! metadata, tag policies) are FLEXIBLE objects.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "inventory_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Cloud resources (tenant scope)
-- =======================================================================
DEFINE TABLE cloud_resource SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE cloud_resource TYPE string;
DEFINE FIELD provider_id ON TABLE cloud_resource TYPE string;
DEFINE FIELD short_id ON TABLE cloud_resource TYPE string;
DEFINE FIELD name ON TABLE cloud_resource TYPE string;
DEFINE FIELD resource_kind ON TABLE cloud_resource TYPE string \
    ASSERT $value IN ['ComputeInstance', 'ManagedDatabase', \
    'ObjectStore', 'BlockVolume'];
DEFINE FIELD region ON TABLE cloud_resource TYPE string;
DEFINE FIELD tags ON TABLE cloud_resource TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD metadata ON TABLE cloud_resource TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD status ON TABLE cloud_resource TYPE string \
    ASSERT $value IN ['running', 'pending', 'stopping', 'stopped', \
    'terminated', 'available', 'error', 'unknown'];
DEFINE FIELD estimated_monthly_cost ON TABLE cloud_resource TYPE float \
    DEFAULT 0.0;
DEFINE FIELD actual_monthly_cost ON TABLE cloud_resource \
    TYPE option<float>;
DEFINE FIELD is_encrypted ON TABLE cloud_resource TYPE bool \
    DEFAULT false;
DEFINE FIELD is_public ON TABLE cloud_resource TYPE bool DEFAULT false;
DEFINE FIELD has_backup ON TABLE cloud_resource TYPE bool DEFAULT false;
DEFINE FIELD compliance_issues ON TABLE cloud_resource \
    TYPE array<object> DEFAULT [];
DEFINE FIELD compliance_issues.*.resource_id ON TABLE cloud_resource \
    TYPE string;
DEFINE FIELD compliance_issues.*.severity ON TABLE cloud_resource \
    TYPE string ASSERT $value IN ['Low', 'Medium', 'High', 'Critical'];
DEFINE FIELD compliance_issues.*.category ON TABLE cloud_resource \
    TYPE string ASSERT $value IN ['Encryption', 'PublicExposure', \
    'Backup', 'Tagging'];
DEFINE FIELD compliance_issues.*.issue ON TABLE cloud_resource \
    TYPE string;
DEFINE FIELD compliance_issues.*.recommendation ON TABLE cloud_resource \
    TYPE string;
DEFINE FIELD first_discovered_at ON TABLE cloud_resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD last_synced_at ON TABLE cloud_resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE cloud_resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_tenant_provider ON TABLE cloud_resource \
    COLUMNS tenant_id, provider_id UNIQUE;
DEFINE INDEX idx_resource_tenant_kind ON TABLE cloud_resource \
    COLUMNS tenant_id, resource_kind;

-- =======================================================================
-- Discovery jobs (tenant scope, append-only history)
-- =======================================================================
DEFINE TABLE discovery_job SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE discovery_job TYPE string;
DEFINE FIELD status ON TABLE discovery_job TYPE string \
    ASSERT $value IN ['Pending', 'Running', 'Completed', 'Failed'];
DEFINE FIELD triggered_by ON TABLE discovery_job TYPE string \
    ASSERT $value IN ['Manual', 'Scheduled'];
DEFINE FIELD requested_kinds ON TABLE discovery_job TYPE array<string> \
    DEFAULT [];
DEFINE FIELD requested_regions ON TABLE discovery_job \
    TYPE array<string> DEFAULT [];
DEFINE FIELD resources_created ON TABLE discovery_job TYPE int DEFAULT 0;
DEFINE FIELD resources_updated ON TABLE discovery_job TYPE int DEFAULT 0;
DEFINE FIELD resources_unchanged ON TABLE discovery_job TYPE int \
    DEFAULT 0;
DEFINE FIELD error_message ON TABLE discovery_job TYPE option<string>;
DEFINE FIELD started_at ON TABLE discovery_job TYPE option<datetime>;
DEFINE FIELD completed_at ON TABLE discovery_job TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE discovery_job TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_job_tenant_created ON TABLE discovery_job \
    COLUMNS tenant_id, created_at;

-- =======================================================================
-- Tag policies (tenant scope, one row per tenant)
-- =======================================================================
DEFINE TABLE tag_policy SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tag_policy TYPE string;
DEFINE FIELD policy ON TABLE tag_policy TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD updated_at ON TABLE tag_policy TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tag_policy_tenant ON TABLE tag_policy \
    COLUMNS tenant_id UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
