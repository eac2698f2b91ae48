//! Task lifecycle types.
//!
//! The task state machine:
//!
//! ```text
//!   submit() ──→ Created ──→ Queued ──→ Running ──→ Completed
//!                   │          │           │
//!                   │          │           ├──→ Failed(reason)
//!                   │          │           │
//!                   └──────────┴───────────┴──→ Cancelled
//! ```
//!
//! **Invariants:**
//! - `submit()` returns once the backend reports `Created`.
//! - Transitions are monotonic: a task never moves backward.
//! - Terminal states (`Completed`, `Failed`, `Cancelled`) are permanent.
//! - Status only changes on the backend; this crate never guesses it.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BraketError;

/// Backend-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new task ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a task, named the way the backend names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted by the backend, not yet queued.
    Created,
    /// Waiting for the device.
    Queued,
    /// Executing on the device.
    Running,
    /// Finished; results are available.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before finishing.
    Cancelled,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Created,
        TaskStatus::Queued,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Position along the lifecycle. All terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Created => 0,
            TaskStatus::Queued => 1,
            TaskStatus::Running => 2,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 3,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// Staying put is allowed; terminal states accept nothing else.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank()
    }

    /// The wire name, e.g. `"COMPLETED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = BraketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(TaskStatus::Created),
            "QUEUED" => Ok(TaskStatus::Queued),
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            // The service spells it both ways.
            "CANCELLED" | "CANCELED" => Ok(TaskStatus::Cancelled),
            other => Err(BraketError::Validation(format!(
                "unknown task status '{other}', expected one of CREATED, QUEUED, RUNNING, COMPLETED, FAILED, CANCELLED"
            ))),
        }
    }
}

/// Where the backend should store raw task output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocation {
    /// S3 bucket name.
    pub bucket: String,
    /// Key prefix inside the bucket.
    pub prefix: String,
}

impl OutputLocation {
    /// Create an output location.
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

impl std::fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix.trim_start_matches('/'))
    }
}

/// A submitted execution request as the backend currently reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTask {
    /// Backend-assigned identifier.
    pub task_id: TaskId,
    /// Status at the time of the read.
    pub status: TaskStatus,
    /// Device the task runs on.
    pub device_arn: String,
    /// Requested number of shots.
    pub shots: u32,
    /// When the backend accepted the task.
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Reason reported for a failed task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Where raw output is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<OutputLocation>,
}

impl ExecutionTask {
    /// Project the task onto its search summary.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.task_id.clone(),
            status: self.status,
            device_arn: self.device_arn.clone(),
            shots: self.shots,
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }
}

/// Compact view of a task returned by searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Backend-assigned identifier.
    pub task_id: TaskId,
    /// Status at the time of the search.
    pub status: TaskStatus,
    /// Device the task runs on.
    pub device_arn: String,
    /// Requested number of shots.
    pub shots: u32,
    /// When the backend accepted the task.
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Filters for a task search. All provided filters must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskQuery {
    /// Only tasks on this device.
    pub device_arn: Option<String>,
    /// Only tasks in exactly this status.
    pub status: Option<TaskStatus>,
    /// Only tasks created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Upper bound on the number of summaries returned.
    pub max_results: usize,
}

impl TaskQuery {
    /// Default cap on search results.
    pub const DEFAULT_MAX_RESULTS: usize = 10;

    /// A query with no filters.
    pub fn new() -> Self {
        Self {
            device_arn: None,
            status: None,
            created_after: None,
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    /// Restrict to one device.
    pub fn with_device(mut self, device_arn: impl Into<String>) -> Self {
        self.device_arn = Some(device_arn.into());
        self
    }

    /// Restrict to one status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to tasks created at or after `instant`.
    pub fn created_after(mut self, instant: DateTime<Utc>) -> Self {
        self.created_after = Some(instant);
        self
    }

    /// Cap the number of results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Check a summary against every provided filter.
    pub fn matches(&self, task: &TaskSummary) -> bool {
        self.device_arn
            .as_deref()
            .is_none_or(|arn| task.device_arn == arn)
            && self.status.is_none_or(|status| task.status == status)
            && self
                .created_after
                .is_none_or(|after| task.created_at >= after)
    }
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(status: TaskStatus, device: &str, age_days: i64) -> TaskSummary {
        TaskSummary {
            task_id: TaskId::new(format!("task-{device}-{age_days}")),
            status,
            device_arn: device.into(),
            shots: 100,
            created_at: Utc::now() - Duration::days(age_days),
            ended_at: None,
        }
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(TaskStatus::Created.can_transition_to(TaskStatus::Queued));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Queued));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!(" QUEUED ".parse::<TaskStatus>().unwrap(), TaskStatus::Queued);
        assert_eq!("CANCELED".parse::<TaskStatus>().unwrap(), TaskStatus::Cancelled);
        assert!("DONE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
        for status in TaskStatus::ALL {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_query_filters_are_conjunctive() {
        let query = TaskQuery::new()
            .with_device("sv1")
            .with_status(TaskStatus::Completed)
            .created_after(Utc::now() - Duration::days(3));

        assert!(query.matches(&summary(TaskStatus::Completed, "sv1", 1)));
        assert!(!query.matches(&summary(TaskStatus::Running, "sv1", 1)));
        assert!(!query.matches(&summary(TaskStatus::Completed, "dm1", 1)));
        assert!(!query.matches(&summary(TaskStatus::Completed, "sv1", 7)));
        assert!(TaskQuery::new().matches(&summary(TaskStatus::Failed, "tn1", 30)));
    }

    #[test]
    fn test_output_location_display() {
        let loc = OutputLocation::new("amazon-braket-results", "/runs/bell");
        assert_eq!(loc.to_string(), "s3://amazon-braket-results/runs/bell");
    }

    #[test]
    fn test_task_id_from() {
        let id: TaskId = "task-123".into();
        assert_eq!(id.as_str(), "task-123");
        assert_eq!(id.to_string(), "task-123");
    }
}
