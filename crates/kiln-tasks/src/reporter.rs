//! Task execution reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::result::TaskStatus;
use crate::task::TaskId;

/// Events emitted during task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A leaf task is starting execution
    Started { id: TaskId, description: String },
    /// A leaf task completed successfully
    Completed { id: TaskId, duration: Duration },
    /// A leaf task failed
    Failed {
        id: TaskId,
        duration: Duration,
        error: String,
    },
    /// A task (leaf or composite) was not executed
    Skipped { id: TaskId, reason: String },
    /// A composite is about to run its children
    GroupStarted {
        id: TaskId,
        description: String,
        task_count: usize,
    },
    /// A composite finished running its children
    GroupCompleted {
        id: TaskId,
        status: TaskStatus,
        duration: Duration,
        touched: usize,
    },
    /// A whole build finished
    AllCompleted {
        total: usize,
        done: usize,
        skipped: usize,
        failed: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { id, description } => {
                tracing::info!("Starting {}: {}", id, description);
            }
            TaskEvent::Completed { id, duration } => {
                tracing::info!("{} completed in {:.1}s", id, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                id,
                duration,
                error,
            } => {
                tracing::error!("{} failed after {:.1}s: {}", id, duration.as_secs_f64(), error);
            }
            TaskEvent::Skipped { id, reason } => {
                tracing::info!("{} skipped: {}", id, reason);
            }
            TaskEvent::GroupStarted {
                id,
                description,
                task_count,
            } => {
                tracing::info!("Starting {} ({} tasks): {}", id, task_count, description);
            }
            TaskEvent::GroupCompleted {
                id,
                status,
                duration,
                touched,
            } => {
                tracing::info!(
                    "{} finished {} in {:.1}s ({} outputs refreshed)",
                    id,
                    status,
                    duration.as_secs_f64(),
                    touched
                );
            }
            TaskEvent::AllCompleted {
                total,
                done,
                skipped,
                failed,
                duration,
            } => {
                tracing::info!(
                    "Build complete: {}/{} done, {} skipped, {} failed ({:.1}s)",
                    done,
                    total,
                    skipped,
                    failed,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry of task reporters, itself a reporter that broadcasts to all
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: TaskReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn TaskReporter>] {
        &self.reporters
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &TaskEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskReporter for TaskReporterRegistry {
    fn report(&self, event: &TaskEvent) {
        self.broadcast(event);
    }
}
