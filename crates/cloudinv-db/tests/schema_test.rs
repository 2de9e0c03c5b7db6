//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn fresh_db() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = fresh_db().await;

    cloudinv_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("tenant"), "missing tenant table");
    assert!(
        info_str.contains("cloud_resource"),
        "missing cloud_resource table"
    );
    assert!(
        info_str.contains("discovery_job"),
        "missing discovery_job table"
    );
    assert!(info_str.contains("tag_policy"), "missing tag_policy table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = fresh_db().await;

    cloudinv_db::run_migrations(&db).await.unwrap();
    cloudinv_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unique_index_rejects_duplicate_provider_ids() {
    let db = fresh_db().await;
    cloudinv_db::run_migrations(&db).await.unwrap();

    let insert = "CREATE cloud_resource SET \
                  tenant_id = 't-1', provider_id = 'arn:aws:s3:::logs', \
                  short_id = 'logs', name = 'logs', \
                  resource_kind = 'ObjectStore', region = 'us-east-1', \
                  status = 'available'";

    db.query(insert).await.unwrap().check().unwrap();

    // Same key under a different record id must still be rejected.
    let result = db.query(insert).await.unwrap().check();
    assert!(
        result.is_err(),
        "duplicate (tenant_id, provider_id) should be rejected"
    );
}

#[tokio::test]
async fn status_vocabulary_is_enforced() {
    let db = fresh_db().await;
    cloudinv_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE cloud_resource SET \
             tenant_id = 't-1', provider_id = 'i-1', short_id = 'i-1', \
             name = 'web', resource_kind = 'ComputeInstance', \
             region = 'us-east-1', status = 'shutting-down'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "raw provider statuses must be normalized");
}
