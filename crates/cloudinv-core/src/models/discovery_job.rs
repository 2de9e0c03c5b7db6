//! Discovery job audit record.
//!
//! A job moves `Pending -> Running -> {Completed | Failed}`. Terminal
//! states are final; the store refuses any further transition.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::ResourceKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobStatus::Pending),
            "Running" => Ok(JobStatus::Running),
            "Completed" => Ok(JobStatus::Completed),
            "Failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// What started a discovery run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobTrigger {
    Manual,
    Scheduled,
}

impl JobTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobTrigger::Manual => "Manual",
            JobTrigger::Scheduled => "Scheduled",
        }
    }
}

impl FromStr for JobTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manual" => Ok(JobTrigger::Manual),
            "Scheduled" => Ok(JobTrigger::Scheduled),
            other => Err(format!("unknown job trigger: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: JobStatus,
    pub trigger: JobTrigger,
    pub requested_kinds: Vec<ResourceKind>,
    /// Empty until credentials are resolved and the region list is known.
    pub requested_regions: Vec<String>,
    pub resources_created: u64,
    pub resources_updated: u64,
    pub resources_unchanged: u64,
    /// Per-kind errors joined with `"; "`.
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DiscoveryJob {
    /// Total number of records the run touched.
    pub fn resources_seen(&self) -> u64 {
        self.resources_created + self.resources_updated + self.resources_unchanged
    }
}

/// Fields required to enqueue a new job.
#[derive(Debug, Clone)]
pub struct CreateDiscoveryJob {
    pub tenant_id: Uuid,
    pub trigger: JobTrigger,
    pub requested_kinds: Vec<ResourceKind>,
    /// Start directly in `Running` instead of `Pending`.
    pub start_running: bool,
}

/// Final tallies written when a job reaches a terminal state.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub requested_regions: Vec<String>,
    pub resources_created: u64,
    pub resources_updated: u64,
    pub resources_unchanged: u64,
    pub errors: Vec<String>,
}

impl JobOutcome {
    /// A run with any captured error is `Failed`.
    pub fn status(&self) -> JobStatus {
        if self.errors.is_empty() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        }
    }

    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_with_errors_fails() {
        let mut outcome = JobOutcome::default();
        assert_eq!(outcome.status(), JobStatus::Completed);
        assert!(outcome.error_message().is_none());

        outcome.errors.push("ComputeInstance/us-east-1: throttled".into());
        outcome.errors.push("ObjectStore/us-east-1: denied".into());
        assert_eq!(outcome.status(), JobStatus::Failed);
        assert_eq!(
            outcome.error_message().unwrap(),
            "ComputeInstance/us-east-1: throttled; ObjectStore/us-east-1: denied"
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
