//! Credential store for sandbox mode.

use async_trait::async_trait;
use cloudinv_provider::error::ProviderResult;
use cloudinv_provider::{CredentialStore, ProviderCredentials};
use uuid::Uuid;

/// Hands every tenant the same keys for the sandbox account, so all
/// tenants discover the fixture.
pub struct SandboxCredentialStore {
    account_id: String,
    regions: Vec<String>,
}

impl SandboxCredentialStore {
    pub fn new(account_id: String, regions: Vec<String>) -> Self {
        Self {
            account_id,
            regions,
        }
    }
}

#[async_trait]
impl CredentialStore for SandboxCredentialStore {
    async fn credentials(&self, _tenant_id: Uuid) -> ProviderResult<Option<ProviderCredentials>> {
        Ok(Some(ProviderCredentials {
            access_key_id: "sandbox".into(),
            secret_access_key: "sandbox".into(),
            session_token: None,
            account_id: self.account_id.clone(),
            regions: self.regions.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_tenant_gets_the_sandbox_account() {
        let store = SandboxCredentialStore::new("000000000000".into(), vec!["eu-west-1".into()]);
        let creds = store.credentials(Uuid::new_v4()).await.unwrap().unwrap();
        assert_eq!(creds.account_id, "000000000000");
        assert_eq!(creds.regions, vec!["eu-west-1".to_string()]);
    }

    #[test]
    fn bundled_fixture_parses() {
        let cloud =
            cloudinv_provider::InMemoryCloud::from_json(include_str!("../../../demos/sandbox.json"))
                .unwrap();
        assert!(cloud.instance_tags("i-0a1b2c3d4e5f60001").is_some());
        assert!(cloud.bucket_tags("sandbox-scratch").is_some());
    }
}
