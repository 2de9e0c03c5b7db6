//! Orphan detection.
//!
//! Explicit heuristics over stored inventory; nothing is persisted.
//! Age is measured from `updated_at`, which only moves when a resource
//! actually drifts, so a stopped instance's age is how long it has
//! been stopped.

use chrono::{DateTime, Duration, Utc};
use cloudinv_core::models::orphan::{OrphanReport, OrphanType, OrphanedResource};
use cloudinv_core::models::resource::{
    CloudResource, ResourceKind, ResourceMetadata, ResourceStatus,
};

use crate::config::OrphanConfig;

#[derive(Debug, Clone, Default)]
pub struct OrphanDetector {
    config: OrphanConfig,
}

impl OrphanDetector {
    pub fn new(config: OrphanConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, resources: &[CloudResource], now: DateTime<Utc>) -> OrphanReport {
        let mut items: Vec<OrphanedResource> = resources
            .iter()
            .filter_map(|r| self.classify(r, now))
            .collect();

        items.sort_by(|a, b| b.potential_savings.total_cmp(&a.potential_savings));
        let total_potential_savings = items.iter().map(|i| i.potential_savings).sum();

        OrphanReport {
            items,
            total_potential_savings,
        }
    }

    fn classify(&self, resource: &CloudResource, now: DateTime<Utc>) -> Option<OrphanedResource> {
        let threshold = Duration::days(self.config.stopped_age_days);
        let idle_for = now - resource.updated_at;

        let (orphan_type, age, savings) = match (&resource.kind, &resource.metadata) {
            (ResourceKind::ComputeInstance, _)
                if resource.status == ResourceStatus::Stopped && idle_for > threshold =>
            {
                (
                    OrphanType::StoppedInstance,
                    idle_for,
                    resource.estimated_monthly_cost,
                )
            }
            (ResourceKind::ObjectStore, ResourceMetadata::ObjectStore { object_count, .. })
                if matches!(object_count, None | Some(0)) =>
            {
                (
                    OrphanType::EmptyBucket,
                    now - resource.first_discovered_at,
                    resource.estimated_monthly_cost * self.config.empty_bucket_savings_fraction,
                )
            }
            (
                ResourceKind::BlockVolume,
                ResourceMetadata::Volume {
                    attached_instance_id: None,
                    ..
                },
            ) if resource.status == ResourceStatus::Available && idle_for > threshold => (
                OrphanType::UnattachedVolume,
                idle_for,
                resource.estimated_monthly_cost,
            ),
            _ => return None,
        };

        Some(OrphanedResource {
            resource: resource.clone(),
            orphan_type,
            age_days: age.num_days().max(0),
            potential_savings: savings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::resource;

    fn stopped_instance(days_ago: i64, cost: f64) -> CloudResource {
        let mut r = resource(ResourceKind::ComputeInstance);
        r.status = ResourceStatus::Stopped;
        r.estimated_monthly_cost = cost;
        r.updated_at = Utc::now() - Duration::days(days_ago);
        r
    }

    #[test]
    fn stopped_instance_past_threshold_saves_full_cost() {
        let detector = OrphanDetector::default();
        let report = detector.detect(
            &[stopped_instance(10, 30.37), stopped_instance(1, 60.74)],
            Utc::now(),
        );

        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_eq!(item.orphan_type, OrphanType::StoppedInstance);
        assert_eq!(item.potential_savings, 30.37);
        assert_eq!(item.age_days, 10);
    }

    #[test]
    fn running_instance_is_never_orphaned() {
        let mut r = stopped_instance(30, 10.0);
        r.status = ResourceStatus::Running;
        assert!(OrphanDetector::default().detect(&[r], Utc::now()).items.is_empty());
    }

    #[test]
    fn empty_or_unknown_bucket_saves_a_fraction() {
        let mut empty = resource(ResourceKind::ObjectStore);
        empty.estimated_monthly_cost = 4.0;
        empty.metadata = ResourceMetadata::ObjectStore {
            object_count: Some(0),
            size_bytes: Some(0),
            versioning_enabled: false,
            public_access_block: true,
        };
        let mut unknown = empty.clone();
        unknown.metadata = ResourceMetadata::ObjectStore {
            object_count: None,
            size_bytes: None,
            versioning_enabled: false,
            public_access_block: true,
        };
        let used = resource(ResourceKind::ObjectStore);

        let report = OrphanDetector::default().detect(&[empty, unknown, used], Utc::now());
        assert_eq!(report.items.len(), 2);
        assert!(report.items.iter().all(|i| i.potential_savings == 2.0));
        assert_eq!(report.total_potential_savings, 4.0);
    }

    #[test]
    fn detached_volume_past_threshold_is_orphaned() {
        let mut volume = resource(ResourceKind::BlockVolume);
        volume.status = ResourceStatus::Available;
        volume.metadata = ResourceMetadata::Volume {
            volume_type: "gp3".into(),
            size_gb: 100,
            iops: None,
            attached_instance_id: None,
        };
        volume.estimated_monthly_cost = 8.0;
        volume.updated_at = Utc::now() - Duration::days(8);

        let report = OrphanDetector::default().detect(&[volume], Utc::now());
        assert_eq!(report.items[0].orphan_type, OrphanType::UnattachedVolume);
        assert_eq!(report.items[0].potential_savings, 8.0);
    }

    #[test]
    fn report_is_sorted_and_groupable() {
        let detector = OrphanDetector::new(OrphanConfig {
            stopped_age_days: 3,
            empty_bucket_savings_fraction: 0.5,
        });
        let mut bucket = resource(ResourceKind::ObjectStore);
        bucket.estimated_monthly_cost = 100.0;
        bucket.metadata = ResourceMetadata::ObjectStore {
            object_count: Some(0),
            size_bytes: Some(0),
            versioning_enabled: false,
            public_access_block: true,
        };

        let report = detector.detect(
            &[stopped_instance(4, 20.0), bucket, stopped_instance(5, 70.0)],
            Utc::now(),
        );

        let savings: Vec<f64> = report.items.iter().map(|i| i.potential_savings).collect();
        assert_eq!(savings, vec![70.0, 50.0, 20.0]);

        let groups = report.by_type();
        assert_eq!(groups[&OrphanType::StoppedInstance].len(), 2);
        assert_eq!(groups[&OrphanType::EmptyBucket].len(), 1);
    }
}
