//! Database-specific error types and conversions.

use cloudinv_core::error::InventoryError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored row could not be decoded: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for InventoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => InventoryError::NotFound { entity, id },
            other => InventoryError::Database(other.to_string()),
        }
    }
}
