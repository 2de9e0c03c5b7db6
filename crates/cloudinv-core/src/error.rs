//! Error types for the cloud inventory engine.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The tenant has no cloud credentials configured. Discovery and
    /// tagging report this as "disabled" rather than as a fault.
    #[error("Cloud credentials not configured for tenant {tenant_id}")]
    CredentialsNotConfigured { tenant_id: Uuid },

    #[error("Provider API error ({service}): {message}")]
    Provider { service: String, message: String },

    #[error("Inventory write failed: {0}")]
    StoreWrite(String),

    #[error("Invalid state transition for {entity} {id}: {reason}")]
    InvalidTransition {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InventoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
