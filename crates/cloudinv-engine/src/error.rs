//! Engine error types.

use cloudinv_core::error::InventoryError;
use thiserror::Error;

/// Input rejected before any provider call or store write.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("at least one resource id is required")]
    EmptyResourceList,

    #[error("at least one tag is required")]
    EmptyTagSet,

    #[error("invalid tag key '{key}': {reason}")]
    InvalidTagKey { key: String, reason: String },

    #[error("invalid value for tag '{key}': {reason}")]
    InvalidTagValue { key: String, reason: String },

    #[error("invalid tag policy: {0}")]
    InvalidPolicy(String),
}

impl From<EngineError> for InventoryError {
    fn from(err: EngineError) -> Self {
        InventoryError::Validation {
            message: err.to_string(),
        }
    }
}
