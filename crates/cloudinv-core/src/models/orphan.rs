//! Orphaned-resource view. Derived on request, never persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::resource::CloudResource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrphanType {
    StoppedInstance,
    EmptyBucket,
    UnattachedVolume,
}

impl OrphanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrphanType::StoppedInstance => "stopped-instance",
            OrphanType::EmptyBucket => "empty-bucket",
            OrphanType::UnattachedVolume => "unattached-volume",
        }
    }
}

impl fmt::Display for OrphanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedResource {
    pub resource: CloudResource,
    pub orphan_type: OrphanType,
    pub age_days: i64,
    pub potential_savings: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrphanReport {
    /// Sorted by potential savings, largest first.
    pub items: Vec<OrphanedResource>,
    pub total_potential_savings: f64,
}

impl OrphanReport {
    pub fn by_type(&self) -> BTreeMap<OrphanType, Vec<&OrphanedResource>> {
        let mut groups: BTreeMap<OrphanType, Vec<&OrphanedResource>> = BTreeMap::new();
        for item in &self.items {
            groups.entry(item.orphan_type).or_default().push(item);
        }
        groups
    }
}
