//! Domain models for the cloud inventory engine.
//!
//! These are the core types shared across all crates.

pub mod compliance;
pub mod discovery_job;
pub mod orphan;
pub mod resource;
pub mod tag_policy;
pub mod tenant;
