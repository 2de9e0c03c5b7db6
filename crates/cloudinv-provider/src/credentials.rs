//! Credential resolution.
//!
//! Credentials are looked up per tenant through an injected
//! [`CredentialStore`] and turned into service clients by an injected
//! [`ClientFactory`]. A tenant without credentials gets a disabled
//! [`ProviderClients`] bundle; that is a normal state, not an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::api::{BlockStorageApi, ComputeApi, DatabaseApi, ObjectStorageApi};
use crate::discover::KindRegistry;
use crate::error::ProviderResult;

/// Region used when a tenant configured none.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Per-tenant provider keys.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub account_id: String,
    /// Regions to sweep. Empty means [`DEFAULT_REGION`].
    pub regions: Vec<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("account_id", &self.account_id)
            .field("regions", &self.regions)
            .finish()
    }
}

/// Opaque "get credentials for tenant" collaborator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `None` when the tenant has not configured credentials.
    async fn credentials(&self, tenant_id: Uuid) -> ProviderResult<Option<ProviderCredentials>>;
}

/// Fixed map of tenant credentials, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    by_tenant: HashMap<Uuid, ProviderCredentials>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tenant_id: Uuid, credentials: ProviderCredentials) -> Self {
        self.by_tenant.insert(tenant_id, credentials);
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn credentials(&self, tenant_id: Uuid) -> ProviderResult<Option<ProviderCredentials>> {
        Ok(self.by_tenant.get(&tenant_id).cloned())
    }
}

/// One client per provider service.
#[derive(Clone)]
pub struct ServiceClients {
    pub compute: Arc<dyn ComputeApi>,
    pub block_storage: Arc<dyn BlockStorageApi>,
    pub database: Arc<dyn DatabaseApi>,
    pub object_storage: Arc<dyn ObjectStorageApi>,
}

/// Builds service clients from credentials. This is the seam where a
/// concrete provider SDK plugs in.
pub trait ClientFactory: Send + Sync {
    fn build(&self, credentials: &ProviderCredentials) -> ProviderResult<ServiceClients>;
}

/// The resolved client bundle for one tenant.
#[derive(Clone, Default)]
pub struct ProviderClients {
    pub enabled: bool,
    pub account_id: String,
    pub regions: Vec<String>,
    registry: KindRegistry,
}

impl ProviderClients {
    /// Bundle for a tenant without credentials. Every lookup is empty.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(account_id: String, regions: Vec<String>, registry: KindRegistry) -> Self {
        let regions = if regions.is_empty() {
            vec![DEFAULT_REGION.to_string()]
        } else {
            regions
        };
        Self {
            enabled: true,
            account_id,
            regions,
            registry,
        }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }
}

/// Resolves tenant credentials into a [`ProviderClients`] bundle.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    factory: Arc<dyn ClientFactory>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { store, factory }
    }

    pub async fn resolve(&self, tenant_id: Uuid) -> ProviderResult<ProviderClients> {
        let Some(credentials) = self.store.credentials(tenant_id).await? else {
            debug!(%tenant_id, "No cloud credentials configured");
            return Ok(ProviderClients::disabled());
        };

        let clients = self.factory.build(&credentials)?;
        let registry = KindRegistry::from_clients(&clients);

        debug!(
            %tenant_id,
            account_id = %credentials.account_id,
            regions = ?credentials.regions,
            "Resolved cloud credentials"
        );

        Ok(ProviderClients::new(
            credentials.account_id,
            credentials.regions,
            registry,
        ))
    }
}
