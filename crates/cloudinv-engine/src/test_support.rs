//! Fixtures shared by unit tests.

use std::collections::BTreeMap;

use chrono::Utc;
use cloudinv_core::models::resource::{
    CloudResource, ResourceKind, ResourceMetadata, ResourceStatus,
};
use uuid::Uuid;

/// A compliant resource of `kind`: encrypted, private, backed up.
pub(crate) fn resource(kind: ResourceKind) -> CloudResource {
    let metadata = match kind {
        ResourceKind::ComputeInstance => ResourceMetadata::Compute {
            instance_type: "t3.micro".into(),
            platform: None,
            public_ip: None,
            private_ip: None,
            vpc_id: None,
            launched_at: None,
            latest_snapshot_at: Some(Utc::now()),
        },
        ResourceKind::ManagedDatabase => ResourceMetadata::Database {
            engine: "postgres".into(),
            engine_version: None,
            instance_class: "db.t3.micro".into(),
            allocated_storage_gb: Some(20),
            multi_az: false,
            backup_retention_days: 7,
        },
        ResourceKind::ObjectStore => ResourceMetadata::ObjectStore {
            object_count: Some(1),
            size_bytes: Some(1),
            versioning_enabled: true,
            public_access_block: true,
        },
        ResourceKind::BlockVolume => ResourceMetadata::Volume {
            volume_type: "gp3".into(),
            size_gb: 10,
            iops: None,
            attached_instance_id: Some("i-1".into()),
        },
    };
    let now = Utc::now();
    CloudResource {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        provider_id: format!("arn:test:{}", Uuid::new_v4()),
        short_id: "test".into(),
        name: "test".into(),
        kind,
        region: "us-east-1".into(),
        tags: BTreeMap::new(),
        metadata,
        status: ResourceStatus::Running,
        estimated_monthly_cost: 10.0,
        actual_monthly_cost: None,
        is_encrypted: true,
        is_public: false,
        has_backup: true,
        compliance_issues: Vec::new(),
        first_discovered_at: now,
        last_synced_at: now,
        updated_at: now,
    }
}
