//! SurrealDB repository implementations.

mod discovery_job;
mod resource;
mod tag_policy;
mod tenant;

pub use discovery_job::SurrealDiscoveryJobRepository;
pub use resource::SurrealResourceRepository;
pub use tag_policy::SurrealTagPolicyRepository;
pub use tenant::SurrealTenantRepository;
