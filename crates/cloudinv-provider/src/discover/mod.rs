//! Kind discoverers and taggers.
//!
//! Each resource kind is one struct implementing [`ResourceDiscoverer`]
//! (list + normalize) and [`ResourceTagger`] (write tags back). The
//! [`KindRegistry`] maps kinds to those implementations; adding a kind
//! means adding a module here and one line in [`KindRegistry::from_clients`].

mod compute;
mod database;
mod object_store;
mod volume;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cloudinv_core::models::resource::{CloudResource, NewResource, ResourceKind, Tags};
use uuid::Uuid;

use crate::credentials::ServiceClients;
use crate::error::{ProviderError, ProviderResult};

pub use compute::ComputeDiscoverer;
pub use database::DatabaseDiscoverer;
pub use object_store::ObjectStoreDiscoverer;
pub use volume::VolumeDiscoverer;

/// Where a discoverer is looking.
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    pub tenant_id: Uuid,
    pub account_id: String,
    pub region: String,
}

/// One kind in one region: the normalized records, and the resources
/// left out because a per-resource lookup failed.
#[derive(Debug, Default)]
pub struct Discovered {
    pub resources: Vec<NewResource>,
    pub skipped: Vec<ProviderError>,
}

impl From<Vec<NewResource>> for Discovered {
    fn from(resources: Vec<NewResource>) -> Self {
        Self {
            resources,
            skipped: Vec::new(),
        }
    }
}

#[async_trait]
pub trait ResourceDiscoverer: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// List every resource of this kind in `ctx.region`, normalized.
    ///
    /// An `Err` means the listing itself failed and nothing was
    /// collected.
    async fn discover(&self, ctx: &DiscoveryContext) -> ProviderResult<Discovered>;
}

#[async_trait]
pub trait ResourceTagger: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// One provider call can tag many resources of a region.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Current provider-side tags can be read before writing.
    fn reads_tags(&self) -> bool {
        false
    }

    async fn read_tags(&self, region: &str, resource: &CloudResource) -> ProviderResult<Tags> {
        let _ = (region, resource);
        Err(ProviderError::Unsupported {
            kind: ResourceTagger::kind(self),
            operation: "read_tags",
        })
    }

    /// Write `tags` to every resource in `resources`. Callers pass a
    /// single resource unless [`supports_batch`](Self::supports_batch).
    async fn write_tags(
        &self,
        region: &str,
        resources: &[&CloudResource],
        tags: &Tags,
    ) -> ProviderResult<()>;
}

/// Discoverers and taggers available for a resolved client bundle.
#[derive(Clone, Default)]
pub struct KindRegistry {
    discoverers: BTreeMap<ResourceKind, Arc<dyn ResourceDiscoverer>>,
    taggers: BTreeMap<ResourceKind, Arc<dyn ResourceTagger>>,
}

impl KindRegistry {
    pub fn from_clients(clients: &ServiceClients) -> Self {
        let mut registry = Self::default();

        let compute = Arc::new(ComputeDiscoverer::new(
            clients.compute.clone(),
            clients.block_storage.clone(),
        ));
        registry.register(compute.clone(), compute);

        let database = Arc::new(DatabaseDiscoverer::new(clients.database.clone()));
        registry.register(database.clone(), database);

        let buckets = Arc::new(ObjectStoreDiscoverer::new(clients.object_storage.clone()));
        registry.register(buckets.clone(), buckets);

        let volumes = Arc::new(VolumeDiscoverer::new(clients.block_storage.clone()));
        registry.register(volumes.clone(), volumes);

        registry
    }

    pub fn register(
        &mut self,
        discoverer: Arc<dyn ResourceDiscoverer>,
        tagger: Arc<dyn ResourceTagger>,
    ) {
        self.discoverers.insert(discoverer.kind(), discoverer);
        self.taggers.insert(tagger.kind(), tagger);
    }

    pub fn discoverer(&self, kind: ResourceKind) -> Option<&Arc<dyn ResourceDiscoverer>> {
        self.discoverers.get(&kind)
    }

    pub fn tagger(&self, kind: ResourceKind) -> Option<&Arc<dyn ResourceTagger>> {
        self.taggers.get(&kind)
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.discoverers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.discoverers.is_empty()
    }
}
