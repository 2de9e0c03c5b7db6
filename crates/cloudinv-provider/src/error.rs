//! Provider error types.

use cloudinv_core::error::InventoryError;
use cloudinv_core::models::resource::ResourceKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// A provider API call failed (throttling, access denied, outage).
    #[error("{service}: {message}")]
    Api { service: String, message: String },

    #[error("credential lookup failed: {0}")]
    CredentialLookup(String),

    #[error("client construction failed: {0}")]
    Client(String),

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },
}

impl ProviderError {
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            message: message.into(),
        }
    }

    /// The provider service the error originated from.
    pub fn service(&self) -> &str {
        match self {
            ProviderError::Api { service, .. } => service,
            ProviderError::CredentialLookup(_) => "credentials",
            ProviderError::Client(_) => "client",
            ProviderError::Unsupported { .. } => "registry",
        }
    }
}

impl From<ProviderError> for InventoryError {
    fn from(err: ProviderError) -> Self {
        let service = err.service().to_string();
        match err {
            ProviderError::Api { message, .. } => InventoryError::Provider { service, message },
            other => InventoryError::Provider {
                service,
                message: other.to_string(),
            },
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
