//! Per-tenant tagging policy consumed by the tag auditor.
//!
//! Policies live in the store so a tenant can tighten or relax its
//! required tags without a code change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compliance::Severity;

/// One required tag key, with an optional format check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRequirement {
    pub key: String,
    /// Regular expression the tag value must match.
    pub pattern: Option<String>,
    /// Severity raised when the tag is missing.
    #[serde(default = "default_missing_severity")]
    pub severity: Severity,
}

fn default_missing_severity() -> Severity {
    Severity::Medium
}

impl TagRequirement {
    pub fn required(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pattern: None,
            severity: default_missing_severity(),
        }
    }

    pub fn with_pattern(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pattern: Some(pattern.into()),
            severity: default_missing_severity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TagPolicy {
    pub required_tags: Vec<TagRequirement>,
}

/// A stored policy row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantTagPolicy {
    pub tenant_id: Uuid,
    pub policy: TagPolicy,
    pub updated_at: DateTime<Utc>,
}
