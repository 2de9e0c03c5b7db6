//! Compliance issue value objects.
//!
//! Issues are recomputed from current state on every scan and stored
//! only as the latest snapshot on their resource. No history is kept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::{ResourceKind, ResourceStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Severity::Low),
            "Medium" => Ok(Severity::Medium),
            "High" => Ok(Severity::High),
            "Critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueCategory {
    Encryption,
    PublicExposure,
    Backup,
    Tagging,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Encryption => "Encryption",
            IssueCategory::PublicExposure => "PublicExposure",
            IssueCategory::Backup => "Backup",
            IssueCategory::Tagging => "Tagging",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Encryption" => Ok(IssueCategory::Encryption),
            "PublicExposure" => Ok(IssueCategory::PublicExposure),
            "Backup" => Ok(IssueCategory::Backup),
            "Tagging" => Ok(IssueCategory::Tagging),
            other => Err(format!("unknown issue category: {other}")),
        }
    }
}

/// A single policy violation on a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceIssue {
    /// The resource this issue was raised against.
    pub resource_id: Uuid,
    pub severity: Severity,
    pub category: IssueCategory,
    pub issue: String,
    pub recommendation: String,
}

/// An issue flattened together with enough resource context to act on
/// it without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceIssue {
    pub resource_id: Uuid,
    pub provider_id: String,
    pub resource_name: String,
    pub kind: ResourceKind,
    pub region: String,
    pub status: ResourceStatus,
    pub severity: Severity,
    pub category: IssueCategory,
    pub issue: String,
    pub recommendation: String,
}

/// Result of rescanning a tenant's inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub resources_scanned: u64,
    pub resources_with_issues: u64,
    pub total_issues: u64,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl ScanSummary {
    pub fn record(&mut self, issues: &[ComplianceIssue]) {
        self.resources_scanned += 1;
        if !issues.is_empty() {
            self.resources_with_issues += 1;
        }
        for issue in issues {
            self.total_issues += 1;
            match issue.severity {
                Severity::Critical => self.critical += 1,
                Severity::High => self.high += 1,
                Severity::Medium => self.medium += 1,
                Severity::Low => self.low += 1,
            }
        }
    }
}
