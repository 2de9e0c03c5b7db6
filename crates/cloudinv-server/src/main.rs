//! Cloud inventory server: application entry point.
//!
//! Connects to the inventory store, builds the engine and runs the
//! scheduled discovery sweep until interrupted.

mod config;
mod sandbox;

use std::sync::Arc;

use anyhow::{Context, Result};
use cloudinv_core::models::tenant::CreateTenant;
use cloudinv_core::repository::TenantRepository;
use cloudinv_db::DbManager;
use cloudinv_db::repository::{
    SurrealDiscoveryJobRepository, SurrealResourceRepository, SurrealTagPolicyRepository,
    SurrealTenantRepository,
};
use cloudinv_engine::{DiscoverySweeper, InventoryService};
use cloudinv_provider::{CredentialResolver, InMemoryClientFactory, InMemoryCloud, StaticCredentialStore};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::sandbox::SandboxCredentialStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter).context("invalid CLOUDINV_LOG value")?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!("Starting cloud inventory server...");

    let db = DbManager::connect(&config.db).await?.client();
    let tenants = SurrealTenantRepository::new(db.clone());

    let resolver = match &config.sandbox {
        Some(sandbox) => {
            let json = tokio::fs::read_to_string(&sandbox.fixture)
                .await
                .with_context(|| format!("failed to read {}", sandbox.fixture.display()))?;
            let cloud = InMemoryCloud::from_json(&json).context("invalid sandbox fixture")?;

            if tenants.list_active().await?.is_empty() {
                let tenant = tenants
                    .create(CreateTenant {
                        name: "Sandbox".into(),
                        slug: sandbox.tenant_slug.clone(),
                    })
                    .await?;
                tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Created sandbox tenant");
            }

            tracing::info!(
                fixture = %sandbox.fixture.display(),
                account_id = %sandbox.account_id,
                "Sandbox provider enabled"
            );
            CredentialResolver::new(
                Arc::new(SandboxCredentialStore::new(
                    sandbox.account_id.clone(),
                    sandbox.regions.clone(),
                )),
                Arc::new(InMemoryClientFactory::new().with_account(sandbox.account_id.clone(), cloud)),
            )
        }
        None => {
            tracing::warn!("No provider configured; every tenant resolves as disabled");
            CredentialResolver::new(
                Arc::new(StaticCredentialStore::new()),
                Arc::new(InMemoryClientFactory::new()),
            )
        }
    };

    let service = Arc::new(InventoryService::new(
        SurrealResourceRepository::new(db.clone()),
        SurrealDiscoveryJobRepository::new(db.clone()),
        SurrealTagPolicyRepository::new(db.clone()),
        resolver,
        config.engine.clone(),
    ));

    let sweeper = DiscoverySweeper::new(tenants, Arc::clone(&service));
    sweeper
        .run(config.sweep_interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    service.shutdown().await;

    tracing::info!("Cloud inventory server stopped.");
    Ok(())
}
