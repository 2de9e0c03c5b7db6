//! Built-in compliance rules.
//!
//! Each rule looks at one concern of a single resource and returns the
//! issues it finds. Rules share no state and never see each other's
//! output; the [`RuleSet`](super::RuleSet) concatenates their results.

use chrono::{DateTime, Duration, Utc};
use cloudinv_core::models::compliance::{ComplianceIssue, IssueCategory, Severity};
use cloudinv_core::models::resource::{CloudResource, ResourceKind, ResourceMetadata};

pub trait ComplianceRule: Send + Sync {
    fn category(&self) -> IssueCategory;
    fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue>;
}

pub(crate) fn issue(
    resource: &CloudResource,
    severity: Severity,
    category: IssueCategory,
    issue: impl Into<String>,
    recommendation: impl Into<String>,
) -> ComplianceIssue {
    ComplianceIssue {
        resource_id: resource.id,
        severity,
        category,
        issue: issue.into(),
        recommendation: recommendation.into(),
    }
}

/// Encryption at rest.
pub struct EncryptionRule;

impl ComplianceRule for EncryptionRule {
    fn category(&self) -> IssueCategory {
        IssueCategory::Encryption
    }

    fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
        if resource.is_encrypted {
            return Vec::new();
        }

        let (severity, text, recommendation) = match resource.kind {
            ResourceKind::ManagedDatabase => (
                Severity::Critical,
                "Database storage is not encrypted",
                "Restore from an encrypted snapshot to enable storage encryption",
            ),
            ResourceKind::ComputeInstance => (
                Severity::High,
                "Instance has unencrypted volumes",
                "Encrypt attached volumes or enable default volume encryption",
            ),
            ResourceKind::ObjectStore => (
                Severity::High,
                "Bucket has no default encryption",
                "Enable default server-side encryption on the bucket",
            ),
            ResourceKind::BlockVolume => (
                Severity::Medium,
                "Volume is not encrypted",
                "Copy the volume through an encrypted snapshot",
            ),
        };

        vec![issue(
            resource,
            severity,
            IssueCategory::Encryption,
            text,
            recommendation,
        )]
    }
}

/// Reachability from the public internet.
pub struct PublicExposureRule;

impl ComplianceRule for PublicExposureRule {
    fn category(&self) -> IssueCategory {
        IssueCategory::PublicExposure
    }

    fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
        if !resource.is_public {
            return Vec::new();
        }

        let (severity, text, recommendation) = match resource.kind {
            ResourceKind::ManagedDatabase => (
                Severity::Critical,
                "Database is publicly accessible",
                "Disable public accessibility and reach the database through a private network",
            ),
            ResourceKind::ObjectStore => (
                Severity::Critical,
                "Bucket is publicly accessible",
                "Enable the public access block and remove public grants",
            ),
            ResourceKind::ComputeInstance => (
                Severity::High,
                "Instance has a public IP address",
                "Move the instance behind a load balancer or restrict its security groups",
            ),
            ResourceKind::BlockVolume => (
                Severity::Medium,
                "Volume snapshots are shared publicly",
                "Make volume snapshots private",
            ),
        };

        vec![issue(
            resource,
            severity,
            IssueCategory::PublicExposure,
            text,
            recommendation,
        )]
    }
}

/// Backups, for kinds expected to carry them.
///
/// Instance snapshots must also be younger than `max_snapshot_age`
/// at evaluation time.
pub struct BackupRule {
    max_snapshot_age: Duration,
}

impl Default for BackupRule {
    fn default() -> Self {
        Self {
            max_snapshot_age: Duration::days(7),
        }
    }
}

impl BackupRule {
    pub fn new(max_snapshot_age: Duration) -> Self {
        Self { max_snapshot_age }
    }

    fn is_backed_up(&self, resource: &CloudResource, now: DateTime<Utc>) -> bool {
        if !resource.has_backup {
            return false;
        }
        match &resource.metadata {
            ResourceMetadata::Compute {
                latest_snapshot_at, ..
            } => latest_snapshot_at.is_some_and(|at| now - at <= self.max_snapshot_age),
            _ => true,
        }
    }

    fn evaluate_at(&self, resource: &CloudResource, now: DateTime<Utc>) -> Vec<ComplianceIssue> {
        if !resource.kind.expects_backup() || self.is_backed_up(resource, now) {
            return Vec::new();
        }

        let (severity, text, recommendation) = match resource.kind {
            ResourceKind::ManagedDatabase => (
                Severity::High,
                "Automated backups are disabled",
                "Set a backup retention period of at least 7 days",
            ),
            _ => (
                Severity::Medium,
                "No recent snapshot of the instance volumes",
                "Schedule regular volume snapshots",
            ),
        };

        vec![issue(
            resource,
            severity,
            IssueCategory::Backup,
            text,
            recommendation,
        )]
    }
}

impl ComplianceRule for BackupRule {
    fn category(&self) -> IssueCategory {
        IssueCategory::Backup
    }

    fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
        self.evaluate_at(resource, Utc::now())
    }
}
