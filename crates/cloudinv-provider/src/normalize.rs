//! Normalization tables shared by the kind discoverers.
//!
//! Provider lifecycle strings map into the closed [`ResourceStatus`]
//! vocabulary and instance classes map to flat monthly estimates. Both
//! lookups fall back to a fixed value instead of failing, so a new
//! provider state or instance family never breaks discovery.

use cloudinv_core::models::resource::{ResourceStatus, Tags};

use crate::api::RawTag;

const COMPUTE_STATUS: &[(&str, ResourceStatus)] = &[
    ("pending", ResourceStatus::Pending),
    ("running", ResourceStatus::Running),
    ("shutting-down", ResourceStatus::Stopping),
    ("stopping", ResourceStatus::Stopping),
    ("stopped", ResourceStatus::Stopped),
    ("terminated", ResourceStatus::Terminated),
];

const DATABASE_STATUS: &[(&str, ResourceStatus)] = &[
    ("available", ResourceStatus::Running),
    ("backing-up", ResourceStatus::Running),
    ("modifying", ResourceStatus::Running),
    ("configuring-enhanced-monitoring", ResourceStatus::Running),
    ("creating", ResourceStatus::Pending),
    ("starting", ResourceStatus::Pending),
    ("rebooting", ResourceStatus::Pending),
    ("stopping", ResourceStatus::Stopping),
    ("stopped", ResourceStatus::Stopped),
    ("deleting", ResourceStatus::Terminated),
    ("failed", ResourceStatus::Error),
    ("storage-full", ResourceStatus::Error),
    ("incompatible-parameters", ResourceStatus::Error),
];

const VOLUME_STATUS: &[(&str, ResourceStatus)] = &[
    ("creating", ResourceStatus::Pending),
    ("available", ResourceStatus::Available),
    ("in-use", ResourceStatus::Running),
    ("deleting", ResourceStatus::Stopping),
    ("deleted", ResourceStatus::Terminated),
    ("error", ResourceStatus::Error),
];

fn lookup(table: &[(&str, ResourceStatus)], raw: &str) -> ResourceStatus {
    let raw = raw.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(key, _)| *key == raw)
        .map(|(_, status)| *status)
        .unwrap_or(ResourceStatus::Unknown)
}

pub fn compute_status(raw: &str) -> ResourceStatus {
    lookup(COMPUTE_STATUS, raw)
}

pub fn database_status(raw: &str) -> ResourceStatus {
    lookup(DATABASE_STATUS, raw)
}

pub fn volume_status(raw: &str) -> ResourceStatus {
    lookup(VOLUME_STATUS, raw)
}

// ---------------------------------------------------------------------------
// Cost estimation (USD per month, on-demand list price)
// ---------------------------------------------------------------------------

pub const DEFAULT_COMPUTE_MONTHLY_COST: f64 = 50.0;
pub const DEFAULT_DATABASE_MONTHLY_COST: f64 = 100.0;
pub const DEFAULT_VOLUME_COST_PER_GB: f64 = 0.10;
pub const BUCKET_COST_PER_GB: f64 = 0.023;
pub const MIN_BUCKET_MONTHLY_COST: f64 = 1.0;

const COMPUTE_MONTHLY_COST: &[(&str, f64)] = &[
    ("t3.nano", 3.80),
    ("t3.micro", 7.59),
    ("t3.small", 15.18),
    ("t3.medium", 30.37),
    ("t3.large", 60.74),
    ("t3.xlarge", 121.47),
    ("m5.large", 70.08),
    ("m5.xlarge", 140.16),
    ("m5.2xlarge", 280.32),
    ("c5.large", 62.05),
    ("c5.xlarge", 124.10),
    ("r5.large", 91.98),
    ("r5.xlarge", 183.96),
];

const DATABASE_MONTHLY_COST: &[(&str, f64)] = &[
    ("db.t3.micro", 12.41),
    ("db.t3.small", 24.82),
    ("db.t3.medium", 49.64),
    ("db.t3.large", 99.28),
    ("db.m5.large", 124.10),
    ("db.m5.xlarge", 248.20),
    ("db.r5.large", 175.20),
    ("db.r5.xlarge", 350.40),
];

const VOLUME_COST_PER_GB: &[(&str, f64)] = &[
    ("gp2", 0.10),
    ("gp3", 0.08),
    ("io1", 0.125),
    ("io2", 0.125),
    ("st1", 0.045),
    ("sc1", 0.015),
    ("standard", 0.05),
];

fn price(table: &[(&str, f64)], key: &str) -> Option<f64> {
    table.iter().find(|(k, _)| *k == key).map(|(_, p)| *p)
}

pub fn compute_monthly_cost(instance_type: &str) -> f64 {
    price(COMPUTE_MONTHLY_COST, instance_type).unwrap_or(DEFAULT_COMPUTE_MONTHLY_COST)
}

pub fn database_monthly_cost(instance_class: &str) -> f64 {
    price(DATABASE_MONTHLY_COST, instance_class).unwrap_or(DEFAULT_DATABASE_MONTHLY_COST)
}

pub fn volume_monthly_cost(volume_type: &str, size_gb: u64) -> f64 {
    let rate = price(VOLUME_COST_PER_GB, volume_type).unwrap_or(DEFAULT_VOLUME_COST_PER_GB);
    rate * size_gb as f64
}

/// Storage cost with a floor; `None` (metrics not yet available) bills
/// at the floor.
pub fn bucket_monthly_cost(size_bytes: Option<u64>) -> f64 {
    let gb = size_bytes.unwrap_or(0) as f64 / (1024.0 * 1024.0 * 1024.0);
    (gb * BUCKET_COST_PER_GB).max(MIN_BUCKET_MONTHLY_COST)
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Flatten a provider tag list. Later duplicates win.
pub fn flatten_tags(raw: &[RawTag]) -> Tags {
    raw.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Display name from the conventional `Name` tag, else the fallback id.
pub fn display_name(tags: &Tags, fallback: &str) -> String {
    tags.get("Name")
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_status_maps_shutting_down_to_stopping() {
        assert_eq!(compute_status("shutting-down"), ResourceStatus::Stopping);
        assert_eq!(compute_status("RUNNING"), ResourceStatus::Running);
        assert_eq!(compute_status("hibernating"), ResourceStatus::Unknown);
    }

    #[test]
    fn database_status_collapses_busy_states_to_running() {
        assert_eq!(database_status("available"), ResourceStatus::Running);
        assert_eq!(database_status("backing-up"), ResourceStatus::Running);
        assert_eq!(database_status("starting"), ResourceStatus::Pending);
        assert_eq!(database_status("storage-full"), ResourceStatus::Error);
        assert_eq!(database_status("inaccessible-encryption-credentials"), ResourceStatus::Unknown);
    }

    #[test]
    fn volume_status_distinguishes_attached_and_free() {
        assert_eq!(volume_status("in-use"), ResourceStatus::Running);
        assert_eq!(volume_status("available"), ResourceStatus::Available);
    }

    #[test]
    fn unknown_classes_fall_back_to_defaults() {
        assert_eq!(compute_monthly_cost("t3.micro"), 7.59);
        assert_eq!(compute_monthly_cost("x9.mega"), DEFAULT_COMPUTE_MONTHLY_COST);
        assert_eq!(database_monthly_cost("db.x9.mega"), DEFAULT_DATABASE_MONTHLY_COST);
        assert!((volume_monthly_cost("gp3", 100) - 8.0).abs() < 1e-9);
        assert!((volume_monthly_cost("exotic", 10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bucket_cost_has_a_floor() {
        assert_eq!(bucket_monthly_cost(None), MIN_BUCKET_MONTHLY_COST);
        assert_eq!(bucket_monthly_cost(Some(4096)), MIN_BUCKET_MONTHLY_COST);
        let one_tb = 1024u64 * 1024 * 1024 * 1024;
        assert!((bucket_monthly_cost(Some(one_tb)) - 1024.0 * BUCKET_COST_PER_GB).abs() < 1e-6);
    }

    #[test]
    fn name_tag_wins_over_id() {
        let tags = flatten_tags(&[RawTag::new("Name", "web-1"), RawTag::new("Env", "prod")]);
        assert_eq!(display_name(&tags, "i-0abc"), "web-1");
        assert_eq!(display_name(&Tags::new(), "i-0abc"), "i-0abc");
    }
}
