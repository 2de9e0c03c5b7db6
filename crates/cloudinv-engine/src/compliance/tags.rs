//! Tag auditor: the data-driven tagging rule.

use cloudinv_core::models::compliance::{ComplianceIssue, IssueCategory, Severity};
use cloudinv_core::models::resource::CloudResource;
use cloudinv_core::models::tag_policy::{TagPolicy, TagRequirement};
use regex::Regex;

use super::rules::{ComplianceRule, issue};
use crate::error::EngineError;

struct CompiledRequirement {
    requirement: TagRequirement,
    pattern: Option<Regex>,
}

/// Checks resources against a tenant's [`TagPolicy`].
///
/// Patterns are compiled once when the auditor is built, so an invalid
/// policy is rejected up front instead of during a scan.
pub struct TagAuditor {
    requirements: Vec<CompiledRequirement>,
}

impl TagAuditor {
    pub fn new(policy: &TagPolicy) -> Result<Self, EngineError> {
        let mut requirements: Vec<CompiledRequirement> = Vec::new();

        for requirement in &policy.required_tags {
            let key = requirement.key.trim();
            if key.is_empty() {
                return Err(EngineError::InvalidPolicy(
                    "required tag key must not be empty".into(),
                ));
            }
            if requirements.iter().any(|r| r.requirement.key == key) {
                return Err(EngineError::InvalidPolicy(format!(
                    "tag '{key}' is listed more than once"
                )));
            }

            let pattern = requirement
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| EngineError::InvalidPolicy(format!("pattern for '{key}': {e}")))?;

            requirements.push(CompiledRequirement {
                requirement: TagRequirement {
                    key: key.to_string(),
                    ..requirement.clone()
                },
                pattern,
            });
        }

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl ComplianceRule for TagAuditor {
    fn category(&self) -> IssueCategory {
        IssueCategory::Tagging
    }

    fn evaluate(&self, resource: &CloudResource) -> Vec<ComplianceIssue> {
        let mut issues = Vec::new();

        for CompiledRequirement {
            requirement,
            pattern,
        } in &self.requirements
        {
            let key = &requirement.key;
            let value = resource
                .tags
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty());

            match (value, pattern) {
                (None, _) => issues.push(issue(
                    resource,
                    requirement.severity,
                    IssueCategory::Tagging,
                    format!("Missing required tag '{key}'"),
                    format!("Add the '{key}' tag"),
                )),
                (Some(value), Some(pattern)) if !pattern.is_match(value) => issues.push(issue(
                    resource,
                    Severity::Low.min(requirement.severity),
                    IssueCategory::Tagging,
                    format!("Tag '{key}' value '{value}' does not match {}", pattern.as_str()),
                    format!("Set '{key}' to a value matching {}", pattern.as_str()),
                )),
                _ => {}
            }
        }

        issues
    }
}
