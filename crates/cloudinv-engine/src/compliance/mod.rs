//! Compliance rule engine.
//!
//! A [`RuleSet`] is the ordered list of rules applied to each resource:
//! encryption, public exposure, backup, then the tenant's tag policy.
//! [`ComplianceScanner`] runs it over a tenant's stored inventory and
//! replaces each resource's issue snapshot.

mod rules;
mod tags;

use cloudinv_core::error::InventoryResult;
use cloudinv_core::models::compliance::{ComplianceIssue, ResourceIssue, ScanSummary};
use cloudinv_core::models::resource::CloudResource;
use cloudinv_core::models::tag_policy::TagPolicy;
use cloudinv_core::repository::{ResourceRepository, TagPolicyRepository};
use tracing::{debug, info};
use uuid::Uuid;

pub use rules::{BackupRule, ComplianceRule, EncryptionRule, PublicExposureRule};
pub use tags::TagAuditor;

use crate::error::EngineError;

pub struct RuleSet {
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl RuleSet {
    /// The built-in rules followed by the tag auditor for `policy`.
    pub fn standard(policy: &TagPolicy) -> Result<Self, EngineError> {
        let auditor = TagAuditor::new(policy)?;
        let mut rules: Vec<Box<dyn ComplianceRule>> = vec![
            Box::new(EncryptionRule),
            Box::new(PublicExposureRule),
            Box::new(BackupRule::default()),
        ];
        if !auditor.is_empty() {
            rules.push(Box::new(auditor));
        }
        Ok(Self { rules })
    }

    pub fn with_rule(mut self, rule: Box<dyn ComplianceRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Every issue raised by every rule, in rule order.
    pub fn scan(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
        self.rules
            .iter()
            .flat_map(|rule| rule.evaluate(resource))
            .collect()
    }
}

/// Reject a policy that would fail to compile into a [`TagAuditor`].
pub fn validate_policy(policy: &TagPolicy) -> Result<(), EngineError> {
    TagAuditor::new(policy).map(|_| ())
}

/// Runs the rule set over a tenant's stored inventory.
#[derive(Clone)]
pub struct ComplianceScanner<R: ResourceRepository, P: TagPolicyRepository> {
    resources: R,
    policies: P,
}

impl<R: ResourceRepository, P: TagPolicyRepository> ComplianceScanner<R, P> {
    pub fn new(resources: R, policies: P) -> Self {
        Self {
            resources,
            policies,
        }
    }

    /// The tenant's stored policy, or the default (no required tags).
    pub async fn policy(&self, tenant_id: Uuid) -> InventoryResult<TagPolicy> {
        Ok(self
            .policies
            .get(tenant_id)
            .await?
            .map(|stored| stored.policy)
            .unwrap_or_default())
    }

    /// Recompute and persist the issue snapshot of every resource.
    pub async fn scan_tenant(&self, tenant_id: Uuid) -> InventoryResult<ScanSummary> {
        let policy = self.policy(tenant_id).await?;
        let rules = RuleSet::standard(&policy)?;
        let resources = self.resources.list_all(tenant_id).await?;

        let mut summary = ScanSummary::default();
        for resource in &resources {
            let issues = rules.scan(resource);
            summary.record(&issues);

            if issues != resource.compliance_issues {
                debug!(
                    %tenant_id,
                    resource_id = %resource.id,
                    issues = issues.len(),
                    "Compliance snapshot changed"
                );
                self.resources
                    .set_compliance_issues(tenant_id, resource.id, issues)
                    .await?;
            }
        }

        info!(
            %tenant_id,
            scanned = summary.resources_scanned,
            with_issues = summary.resources_with_issues,
            critical = summary.critical,
            high = summary.high,
            "Compliance scan finished"
        );

        Ok(summary)
    }

    /// Latest stored issues across the tenant, most severe first.
    pub async fn issues(&self, tenant_id: Uuid) -> InventoryResult<Vec<ResourceIssue>> {
        let resources = self.resources.list_all(tenant_id).await?;

        let mut issues: Vec<ResourceIssue> = resources
            .into_iter()
            .flat_map(|r| {
                r.compliance_issues
                    .iter()
                    .map(|i| ResourceIssue {
                        resource_id: r.id,
                        provider_id: r.provider_id.clone(),
                        resource_name: r.name.clone(),
                        kind: r.kind,
                        region: r.region.clone(),
                        status: r.status,
                        severity: i.severity,
                        category: i.category,
                        issue: i.issue.clone(),
                        recommendation: i.recommendation.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        issues.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.resource_name.cmp(&b.resource_name))
        });
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use cloudinv_core::models::compliance::{IssueCategory, Severity};
    use cloudinv_core::models::resource::ResourceKind;
    use cloudinv_core::models::tag_policy::TagRequirement;

    use super::*;
    use crate::test_support::resource;

    #[test]
    fn issues_accumulate_across_rules_in_order() {
        let policy = TagPolicy {
            required_tags: vec![TagRequirement::required("Owner")],
        };
        let rules = RuleSet::standard(&policy).unwrap();

        let mut db = resource(ResourceKind::ManagedDatabase);
        db.is_encrypted = false;
        db.is_public = true;
        db.has_backup = false;

        let issues = rules.scan(&db);
        let categories: Vec<IssueCategory> = issues.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                IssueCategory::Encryption,
                IssueCategory::PublicExposure,
                IssueCategory::Backup,
                IssueCategory::Tagging,
            ]
        );
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[1].severity, Severity::Critical);
        assert_eq!(issues[2].severity, Severity::High);
    }

    #[test]
    fn unencrypted_database_yields_exactly_one_critical_encryption_issue() {
        let rules = RuleSet::standard(&TagPolicy::default()).unwrap();
        let mut db = resource(ResourceKind::ManagedDatabase);
        db.is_encrypted = false;

        let first = rules.scan(&db);
        let encryption: Vec<_> = first
            .iter()
            .filter(|i| i.category == IssueCategory::Encryption)
            .collect();
        assert_eq!(encryption.len(), 1);
        assert_eq!(encryption[0].severity, Severity::Critical);

        assert_eq!(rules.scan(&db), first, "rescans are deterministic");
    }

    /// Flags resources without a `Name` tag.
    struct NameTagRule;

    impl ComplianceRule for NameTagRule {
        fn category(&self) -> IssueCategory {
            IssueCategory::Tagging
        }

        fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
            if resource.tags.contains_key("Name") {
                return Vec::new();
            }
            vec![ComplianceIssue {
                resource_id: resource.id,
                severity: Severity::Low,
                category: IssueCategory::Tagging,
                issue: "Missing Name tag".into(),
                recommendation: "Add a Name tag".into(),
            }]
        }
    }

    #[test]
    fn extra_rules_run_after_the_standard_ones() {
        let rules = RuleSet::standard(&TagPolicy::default())
            .unwrap()
            .with_rule(Box::new(NameTagRule));

        let mut vm = resource(ResourceKind::ComputeInstance);
        vm.is_public = true;
        let categories: Vec<IssueCategory> =
            rules.scan(&vm).iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![IssueCategory::PublicExposure, IssueCategory::Tagging]
        );

        vm.tags.insert("Name".into(), "web".into());
        assert_eq!(rules.scan(&vm).len(), 1);
    }

    #[test]
    fn compliant_resource_has_no_issues() {
        let rules = RuleSet::standard(&TagPolicy::default()).unwrap();
        for kind in ResourceKind::ALL {
            assert!(rules.scan(&resource(kind)).is_empty(), "{kind}");
        }
    }
}
