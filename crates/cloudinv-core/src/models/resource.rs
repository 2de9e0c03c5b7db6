//! Canonical cloud resource record.
//!
//! Every provider response is normalized into a [`CloudResource`]. The
//! record is keyed by `(tenant_id, provider_id)`; its `id` is derived
//! deterministically from that pair so that repeated discovery of the
//! same provider object always lands on the same row.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compliance::ComplianceIssue;

/// Flat tag map. Provider tag lists are normalized into this shape.
pub type Tags = BTreeMap<String, String>;

/// Resource category. Drives normalization, rule selection and the
/// provider API used for tagging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ComputeInstance,
    ManagedDatabase,
    ObjectStore,
    BlockVolume,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ComputeInstance,
        ResourceKind::ManagedDatabase,
        ResourceKind::ObjectStore,
        ResourceKind::BlockVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "ComputeInstance",
            ResourceKind::ManagedDatabase => "ManagedDatabase",
            ResourceKind::ObjectStore => "ObjectStore",
            ResourceKind::BlockVolume => "BlockVolume",
        }
    }

    /// Whether this kind is expected to carry backups.
    pub fn expects_backup(&self) -> bool {
        matches!(
            self,
            ResourceKind::ComputeInstance | ResourceKind::ManagedDatabase
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ComputeInstance" => Ok(ResourceKind::ComputeInstance),
            "ManagedDatabase" => Ok(ResourceKind::ManagedDatabase),
            "ObjectStore" => Ok(ResourceKind::ObjectStore),
            "BlockVolume" => Ok(ResourceKind::BlockVolume),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Closed lifecycle vocabulary every provider status maps into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Running,
    Pending,
    Stopping,
    Stopped,
    Terminated,
    Available,
    Error,
    Unknown,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Running => "running",
            ResourceStatus::Pending => "pending",
            ResourceStatus::Stopping => "stopping",
            ResourceStatus::Stopped => "stopped",
            ResourceStatus::Terminated => "terminated",
            ResourceStatus::Available => "available",
            ResourceStatus::Error => "error",
            ResourceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ResourceStatus::Running),
            "pending" => Ok(ResourceStatus::Pending),
            "stopping" => Ok(ResourceStatus::Stopping),
            "stopped" => Ok(ResourceStatus::Stopped),
            "terminated" => Ok(ResourceStatus::Terminated),
            "available" => Ok(ResourceStatus::Available),
            "error" => Ok(ResourceStatus::Error),
            "unknown" => Ok(ResourceStatus::Unknown),
            other => Err(format!("unknown resource status: {other}")),
        }
    }
}

/// Kind-specific descriptive payload.
///
/// Serialized with a `kind` discriminator so the stored JSON stays
/// self-describing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceMetadata {
    Compute {
        instance_type: String,
        platform: Option<String>,
        public_ip: Option<String>,
        private_ip: Option<String>,
        vpc_id: Option<String>,
        launched_at: Option<DateTime<Utc>>,
        /// Oldest of the attached volumes' latest snapshots; `None` when
        /// any attached volume has never been snapshotted.
        latest_snapshot_at: Option<DateTime<Utc>>,
    },
    Database {
        engine: String,
        engine_version: Option<String>,
        instance_class: String,
        allocated_storage_gb: Option<u64>,
        multi_az: bool,
        backup_retention_days: u32,
    },
    ObjectStore {
        /// `None` when the provider did not report an object count.
        object_count: Option<u64>,
        size_bytes: Option<u64>,
        versioning_enabled: bool,
        public_access_block: bool,
    },
    Volume {
        volume_type: String,
        size_gb: u64,
        iops: Option<u32>,
        attached_instance_id: Option<String>,
    },
}

impl ResourceMetadata {
    /// The resource kind this payload belongs to.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceMetadata::Compute { .. } => ResourceKind::ComputeInstance,
            ResourceMetadata::Database { .. } => ResourceKind::ManagedDatabase,
            ResourceMetadata::ObjectStore { .. } => ResourceKind::ObjectStore,
            ResourceMetadata::Volume { .. } => ResourceKind::BlockVolume,
        }
    }
}

/// The canonical inventory entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudResource {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Provider-native unique identifier (ARN-equivalent).
    pub provider_id: String,
    /// Short provider id (e.g. `i-0abc`), or the bucket name.
    pub short_id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub region: String,
    pub tags: Tags,
    pub metadata: ResourceMetadata,
    pub status: ResourceStatus,
    pub estimated_monthly_cost: f64,
    /// Billed cost when usage data is available.
    pub actual_monthly_cost: Option<f64>,
    pub is_encrypted: bool,
    pub is_public: bool,
    pub has_backup: bool,
    /// Latest compliance snapshot; replaced wholesale on every scan.
    pub compliance_issues: Vec<ComplianceIssue>,
    pub first_discovered_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    /// Last time a descriptive field actually changed.
    pub updated_at: DateTime<Utc>,
}

impl CloudResource {
    /// Deterministic record id for a `(tenant, provider id)` pair.
    pub fn record_id(tenant_id: Uuid, provider_id: &str) -> Uuid {
        Uuid::new_v5(&tenant_id, provider_id.as_bytes())
    }

    /// Whether applying `input` would change any mutable field.
    pub fn differs_from(&self, input: &NewResource) -> bool {
        self.name != input.name
            || self.short_id != input.short_id
            || self.region != input.region
            || self.tags != input.tags
            || self.metadata != input.metadata
            || self.status != input.status
            || self.estimated_monthly_cost != input.estimated_monthly_cost
            || self.actual_monthly_cost != input.actual_monthly_cost
            || self.is_encrypted != input.is_encrypted
            || self.is_public != input.is_public
            || self.has_backup != input.has_backup
    }
}

/// A normalized record produced by a kind discoverer, ready for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResource {
    pub tenant_id: Uuid,
    pub provider_id: String,
    pub short_id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub region: String,
    pub tags: Tags,
    pub metadata: ResourceMetadata,
    pub status: ResourceStatus,
    pub estimated_monthly_cost: f64,
    pub actual_monthly_cost: Option<f64>,
    pub is_encrypted: bool,
    pub is_public: bool,
    pub has_backup: bool,
}

/// How an upsert affected the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpsertChange {
    /// No row existed for the key.
    Created,
    /// The row existed and at least one mutable field drifted.
    Updated,
    /// The row existed and matched; only `last_synced_at` moved.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub resource: CloudResource,
    pub change: UpsertChange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_stable_per_tenant() {
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let arn = "arn:aws:ec2:us-east-1:123456789012:instance/i-0abc";

        assert_eq!(
            CloudResource::record_id(tenant, arn),
            CloudResource::record_id(tenant, arn)
        );
        assert_ne!(
            CloudResource::record_id(tenant, arn),
            CloudResource::record_id(other, arn)
        );
    }

    #[test]
    fn metadata_serializes_with_kind_tag() {
        let meta = ResourceMetadata::ObjectStore {
            object_count: Some(0),
            size_bytes: None,
            versioning_enabled: false,
            public_access_block: true,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "object_store");

        let back: ResourceMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
        assert_eq!(back.kind(), ResourceKind::ObjectStore);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ResourceStatus::Running,
            ResourceStatus::Stopped,
            ResourceStatus::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<ResourceStatus>().unwrap(), status);
        }
        assert!("shutting-down".parse::<ResourceStatus>().is_err());
    }
}
