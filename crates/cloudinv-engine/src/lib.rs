//! Cloud inventory engine: discovery orchestration, compliance
//! scanning, orphan detection and bulk tag remediation.

pub mod compliance;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orphan;
pub mod remediation;
pub mod service;
pub mod sweep;
pub mod tasks;

#[cfg(test)]
mod test_support;

pub use compliance::{ComplianceRule, ComplianceScanner, RuleSet, TagAuditor};
pub use config::{EngineConfig, OrphanConfig};
pub use discovery::DiscoveryOrchestrator;
pub use error::EngineError;
pub use orphan::OrphanDetector;
pub use remediation::{RemediationExecutor, RemediationFailure, RemediationReport};
pub use service::InventoryService;
pub use sweep::{DiscoverySweeper, SweepSummary};
pub use tasks::BackgroundTasks;
