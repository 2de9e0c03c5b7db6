//! Cloud provider access: capability traits per provider service,
//! credential resolution, and the kind discoverers that normalize raw
//! provider responses into [`NewResource`](cloudinv_core::models::resource::NewResource)
//! records.

pub mod api;
pub mod credentials;
pub mod discover;
pub mod error;
pub mod memory;
pub mod normalize;

pub use credentials::{
    ClientFactory, CredentialResolver, CredentialStore, ProviderClients, ProviderCredentials,
    ServiceClients, StaticCredentialStore,
};
pub use discover::{Discovered, DiscoveryContext, KindRegistry, ResourceDiscoverer, ResourceTagger};
pub use error::{ProviderError, ProviderResult};
pub use memory::{InMemoryClientFactory, InMemoryCloud};
