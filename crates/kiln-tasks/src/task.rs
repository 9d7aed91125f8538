//! Task types and the execution context

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reporter::{TaskReporter, TracingReporter};
use crate::result::TaskOutcome;

/// Identifier of a task within one build
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId {
    /// Action or stage kind (e.g. "cxx", "link", "compile")
    pub kind: String,
    /// What the task acts on (a file, a target, a project)
    pub subject: String,
}

impl TaskId {
    /// Create a new task ID
    pub fn new(kind: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subject: subject.into(),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.subject)
    }
}

/// A unit of work with declared inputs and outputs.
///
/// Leaf tasks perform one external action. Composite tasks return their
/// children from [`Task::children`] and define `execute` in terms of them.
/// `execute` never fails: action errors are reported as a FAILED result.
#[async_trait]
pub trait Task: Send + Sync {
    /// Task identifier
    fn id(&self) -> &TaskId;

    /// Human-readable description
    fn description(&self) -> String {
        self.id().to_string()
    }

    /// Files read by this task, absolute
    fn input_files(&self) -> Vec<PathBuf>;

    /// Files written by this task, absolute
    fn output_files(&self) -> Vec<PathBuf>;

    /// Child tasks, `None` for leaves
    fn children(&self) -> Option<&[Arc<dyn Task>]> {
        None
    }

    /// Run the task
    async fn execute(&self, ctx: &ExecutionContext) -> TaskOutcome;
}

/// Settings shared by every task of one build invocation
#[derive(Clone)]
pub struct ExecutionContext {
    /// Maximum number of children a concurrent composite runs at once
    pub parallelism: usize,
    /// Progress sink
    pub reporter: Arc<dyn TaskReporter>,
}

impl ExecutionContext {
    /// Create a context sized to the available hardware parallelism
    pub fn new(reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            parallelism: available_parallelism(),
            reporter,
        }
    }

    /// Override the parallelism; zero is treated as one
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

/// Number of hardware threads, falling back to 4
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
