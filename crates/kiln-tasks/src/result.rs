//! Task results and build reports

use std::fmt;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::task::{Task, TaskId};

/// Reason attached to results of tasks whose outputs are still valid
pub const UP_TO_DATE: &str = "Up-to-date";

/// Reason attached to tasks not attempted because an earlier stage failed
pub const UPSTREAM_FAILED: &str = "Skipped after upstream failure";

/// Terminal status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// The task ran and succeeded
    Done,
    /// The task did not run
    Skip,
    /// The task ran and failed
    Failed,
}

impl TaskStatus {
    /// Check if this status represents a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Combine sibling statuses: FAILED wins over DONE, DONE wins over SKIP
    pub fn aggregate<I: IntoIterator<Item = TaskStatus>>(statuses: I) -> TaskStatus {
        statuses.into_iter().fold(TaskStatus::Skip, |acc, s| match (acc, s) {
            (TaskStatus::Failed, _) | (_, TaskStatus::Failed) => TaskStatus::Failed,
            (TaskStatus::Done, _) | (_, TaskStatus::Done) => TaskStatus::Done,
            _ => TaskStatus::Skip,
        })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "DONE",
            Self::Skip => "SKIP",
            Self::Failed => "FAILED",
        })
    }
}

/// Outcome of a single leaf task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// Task that produced this result
    pub task: TaskId,
    /// Terminal status
    pub status: TaskStatus,
    /// Why the task was skipped, or the diagnostic of a failure
    pub reason: Option<String>,
    /// How long the task took
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl TaskResult {
    /// Successful execution
    pub fn done(task: TaskId, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Done,
            reason: None,
            duration,
        }
    }

    /// Task not executed
    pub fn skip(task: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task,
            status: TaskStatus::Skip,
            reason: Some(reason.into()),
            duration: Duration::ZERO,
        }
    }

    /// Failed execution with a diagnostic
    pub fn failed(task: TaskId, diagnostic: impl Into<String>, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Failed,
            reason: Some(diagnostic.into()),
            duration,
        }
    }
}

/// Result of a task: a leaf result or the report of a composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Leaf result
    Task(TaskResult),
    /// Composite report
    Group(BuildReport),
}

impl TaskOutcome {
    /// Status of this outcome
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Task(result) => result.status,
            Self::Group(report) => report.status(),
        }
    }

    /// Task this outcome describes
    pub fn task(&self) -> &TaskId {
        match self {
            Self::Task(result) => &result.task,
            Self::Group(report) => &report.task,
        }
    }

    /// Leaf result, if this is one
    pub fn as_result(&self) -> Option<&TaskResult> {
        match self {
            Self::Task(result) => Some(result),
            Self::Group(_) => None,
        }
    }

    /// Composite report, if this is one
    pub fn as_report(&self) -> Option<&BuildReport> {
        match self {
            Self::Task(_) => None,
            Self::Group(report) => Some(report),
        }
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a TaskResult>) {
        match self {
            Self::Task(result) => leaves.push(result),
            Self::Group(report) => {
                for child in &report.children {
                    child.collect_leaves(leaves);
                }
            }
        }
    }
}

impl Serialize for TaskOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Task(result) => result.serialize(serializer),
            Self::Group(report) => report.serialize(serializer),
        }
    }
}

/// Report of a composite task, mirroring its tree of children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Composite that produced this report
    pub task: TaskId,
    /// Composite description
    pub description: String,
    /// Child outcomes in child order
    pub children: Vec<TaskOutcome>,
    /// How long the composite took
    pub duration: Duration,
}

impl BuildReport {
    /// Create a report
    pub fn new(
        task: TaskId,
        description: impl Into<String>,
        children: Vec<TaskOutcome>,
        duration: Duration,
    ) -> Self {
        Self {
            task,
            description: description.into(),
            children,
            duration,
        }
    }

    /// Overall status: FAILED if any descendant failed, else DONE if any
    /// descendant ran, else SKIP
    pub fn status(&self) -> TaskStatus {
        TaskStatus::aggregate(self.children.iter().map(TaskOutcome::status))
    }

    /// All leaf results in tree order
    pub fn leaves(&self) -> Vec<&TaskResult> {
        let mut leaves = Vec::new();
        for child in &self.children {
            child.collect_leaves(&mut leaves);
        }
        leaves
    }

    /// Number of leaves with the given status
    pub fn count(&self, status: TaskStatus) -> usize {
        self.leaves().iter().filter(|r| r.status == status).count()
    }

    /// Failed leaf results
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.leaves()
            .into_iter()
            .filter(|r| r.status.is_failure())
            .collect()
    }

    /// Find a direct child outcome by task ID
    pub fn child(&self, id: &TaskId) -> Option<&TaskOutcome> {
        self.children.iter().find(|c| c.task() == id)
    }

    /// Find a leaf result anywhere in the tree
    pub fn find(&self, id: &TaskId) -> Option<&TaskResult> {
        self.leaves().into_iter().find(|r| &r.task == id)
    }
}

impl Serialize for BuildReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BuildReport", 5)?;
        state.serialize_field("task", &self.task)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("duration_ms", &(self.duration.as_millis() as u64))?;
        state.serialize_field("children", &self.children)?;
        state.end()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Outcome for a task that is not executed: SKIP with `reason` for every
/// descendant leaf, mirroring the subtree's shape.
pub fn skipped_outcome(task: &dyn Task, reason: &str) -> TaskOutcome {
    match task.children() {
        None => TaskOutcome::Task(TaskResult::skip(task.id().clone(), reason)),
        Some(children) => TaskOutcome::Group(BuildReport::new(
            task.id().clone(),
            task.description(),
            children
                .iter()
                .map(|child| skipped_outcome(child.as_ref(), reason))
                .collect(),
            Duration::ZERO,
        )),
    }
}
