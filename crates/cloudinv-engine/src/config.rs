//! Engine configuration.

use cloudinv_core::models::resource::ResourceKind;

/// Thresholds for the orphan heuristics.
#[derive(Debug, Clone)]
pub struct OrphanConfig {
    /// Days a compute instance must have been stopped, or a volume
    /// detached, before it counts as orphaned (default: 7).
    pub stopped_age_days: i64,
    /// Share of an empty bucket's estimated cost that deleting it is
    /// expected to save (default: 0.5).
    pub empty_bucket_savings_fraction: f64,
}

impl Default for OrphanConfig {
    fn default() -> Self {
        Self {
            stopped_age_days: 7,
            empty_bucket_savings_fraction: 0.5,
        }
    }
}

/// Configuration for discovery, scanning and remediation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Kinds discovered by every job, in order (default: all kinds).
    pub kinds: Vec<ResourceKind>,
    /// Rescan compliance for the tenant after each discovery run
    /// that touched at least one resource (default: true).
    pub scan_after_discovery: bool,
    /// Upper bound for `list_jobs` (default: 100).
    pub max_job_list: u64,
    pub orphan: OrphanConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kinds: ResourceKind::ALL.to_vec(),
            scan_after_discovery: true,
            max_job_list: 100,
            orphan: OrphanConfig::default(),
        }
    }
}
