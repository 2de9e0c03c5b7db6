//! Cloud inventory core: domain models, repository traits and the
//! shared error taxonomy.
//!
//! Every other crate in the workspace depends on this one; it has no
//! knowledge of the database or of any cloud provider.

pub mod error;
pub mod models;
pub mod repository;
