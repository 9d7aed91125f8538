//! Composite tasks - run a list of children and aggregate their outcomes

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::reporter::TaskEvent;
use crate::result::{skipped_outcome, BuildReport, TaskOutcome, TaskResult, UPSTREAM_FAILED, UP_TO_DATE};
use crate::staleness::{self, Freshness};
use crate::task::{ExecutionContext, Task, TaskId};

/// A task whose execution is running its children.
///
/// An *incremental* composite (the default) first checks the union of its
/// children's files against the staleness rule and skips the whole subtree
/// when nothing changed; after running it refreshes its outputs' timestamps.
/// A *sequence* composite only orders its children.
///
/// Children of a concurrent composite must declare disjoint outputs; this is
/// a precondition of whoever builds the tree and is not checked here.
pub struct CompositeTask {
    id: TaskId,
    description: String,
    children: Vec<Arc<dyn Task>>,
    concurrent: bool,
    incremental: bool,
    halt_on_failure: bool,
}

impl CompositeTask {
    /// Create an incremental, sequential composite
    pub fn new(id: TaskId, children: Vec<Arc<dyn Task>>) -> Self {
        let description = id.to_string();
        Self {
            id,
            description,
            children,
            concurrent: false,
            incremental: true,
            halt_on_failure: false,
        }
    }

    /// Create a composite that only sequences its children, without a
    /// staleness check or timestamp refresh of its own
    pub fn sequence(id: TaskId, children: Vec<Arc<dyn Task>>) -> Self {
        Self {
            incremental: false,
            ..Self::new(id, children)
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Run children concurrently
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Skip the remaining children of a sequential composite after a failure
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Child tasks
    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.children
    }

    /// Staleness of the union of the children's files
    pub fn freshness(&self) -> Freshness {
        staleness::check(&self.input_files(), &self.output_files())
    }

    /// Refresh the timestamp of every declared output, except outputs of
    /// children that failed. Returns the number of files touched.
    pub fn touch_outputs(&self, outcomes: &[TaskOutcome]) -> usize {
        let mut paths = Vec::new();
        for (child, outcome) in self.children.iter().zip(outcomes) {
            collect_touchable(child.as_ref(), outcome, &mut paths);
        }
        staleness::touch_all(&dedup(paths))
    }

    async fn run_concurrently(&self, ctx: &ExecutionContext) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(ctx.parallelism.max(1)));
        let mut handles = Vec::with_capacity(self.children.len());

        for child in &self.children {
            let permit = semaphore.clone().acquire_owned().await.ok();
            handles.push((child.id().clone(), spawn_child(child, ctx, permit)));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            outcomes.push(join_child(id, handle, ctx).await);
        }
        outcomes
    }

    async fn run_sequentially(&self, ctx: &ExecutionContext) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(self.children.len());
        let mut failed = false;

        for child in &self.children {
            if failed && self.halt_on_failure {
                ctx.reporter.report(&TaskEvent::Skipped {
                    id: child.id().clone(),
                    reason: UPSTREAM_FAILED.to_string(),
                });
                outcomes.push(skipped_outcome(child.as_ref(), UPSTREAM_FAILED));
                continue;
            }

            let handle = spawn_child(child, ctx, None);
            let outcome = join_child(child.id().clone(), handle, ctx).await;
            if outcome.status().is_failure() {
                failed = true;
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[async_trait]
impl Task for CompositeTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn input_files(&self) -> Vec<PathBuf> {
        dedup(self.children.iter().flat_map(|c| c.input_files()).collect())
    }

    fn output_files(&self) -> Vec<PathBuf> {
        dedup(self.children.iter().flat_map(|c| c.output_files()).collect())
    }

    fn children(&self) -> Option<&[Arc<dyn Task>]> {
        Some(&self.children)
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();

        if self.children.is_empty() {
            return TaskOutcome::Group(BuildReport::new(
                self.id.clone(),
                self.description.clone(),
                Vec::new(),
                Duration::ZERO,
            ));
        }

        if self.incremental {
            let freshness = self.freshness();
            if freshness.is_up_to_date() {
                debug!(task = %self.id, "up to date, skipping {} tasks", self.children.len());
                ctx.reporter.report(&TaskEvent::Skipped {
                    id: self.id.clone(),
                    reason: UP_TO_DATE.to_string(),
                });
                return skipped_outcome(self, UP_TO_DATE);
            }
            debug!(task = %self.id, reason = %freshness, "stale");
        }

        ctx.reporter.report(&TaskEvent::GroupStarted {
            id: self.id.clone(),
            description: self.description.clone(),
            task_count: self.children.len(),
        });

        let outcomes = if self.concurrent {
            self.run_concurrently(ctx).await
        } else {
            self.run_sequentially(ctx).await
        };

        let touched = if self.incremental {
            self.touch_outputs(&outcomes)
        } else {
            0
        };

        let report = BuildReport::new(
            self.id.clone(),
            self.description.clone(),
            outcomes,
            start.elapsed(),
        );
        ctx.reporter.report(&TaskEvent::GroupCompleted {
            id: self.id.clone(),
            status: report.status(),
            duration: report.duration,
            touched,
        });
        TaskOutcome::Group(report)
    }
}

/// Run a child on its own task so that a panic stays contained
fn spawn_child(
    child: &Arc<dyn Task>,
    ctx: &ExecutionContext,
    permit: Option<OwnedSemaphorePermit>,
) -> JoinHandle<TaskOutcome> {
    let child = Arc::clone(child);
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let outcome = run_child(child, &ctx).await;
        drop(permit);
        outcome
    })
}

/// Wait for a spawned child; a panic becomes a FAILED result
async fn join_child(
    id: TaskId,
    handle: JoinHandle<TaskOutcome>,
    ctx: &ExecutionContext,
) -> TaskOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            let error = format!("Task panicked: {}", e);
            ctx.reporter.report(&TaskEvent::Failed {
                id: id.clone(),
                duration: Duration::ZERO,
                error: error.clone(),
            });
            TaskOutcome::Task(TaskResult::failed(id, error, Duration::ZERO))
        }
    }
}

/// Run one child. Leaves are checked individually first so that only the
/// stale units of a stale composite execute; composites check themselves.
async fn run_child(child: Arc<dyn Task>, ctx: &ExecutionContext) -> TaskOutcome {
    if child.children().is_some() {
        return child.execute(ctx).await;
    }

    let id = child.id().clone();
    if staleness::is_up_to_date(&child.input_files(), &child.output_files()) {
        ctx.reporter.report(&TaskEvent::Skipped {
            id: id.clone(),
            reason: UP_TO_DATE.to_string(),
        });
        return TaskOutcome::Task(TaskResult::skip(id, UP_TO_DATE));
    }

    ctx.reporter.report(&TaskEvent::Started {
        id: id.clone(),
        description: child.description(),
    });
    let start = Instant::now();
    let outcome = child.execute(ctx).await;

    match outcome.as_result() {
        Some(result) if result.status.is_failure() => {
            ctx.reporter.report(&TaskEvent::Failed {
                id,
                duration: start.elapsed(),
                error: result.reason.clone().unwrap_or_default(),
            });
        }
        _ => {
            ctx.reporter.report(&TaskEvent::Completed {
                id,
                duration: start.elapsed(),
            });
        }
    }
    outcome
}

fn collect_touchable(task: &dyn Task, outcome: &TaskOutcome, paths: &mut Vec<PathBuf>) {
    match (task.children(), outcome) {
        (Some(children), TaskOutcome::Group(report)) => {
            for (child, child_outcome) in children.iter().zip(&report.children) {
                collect_touchable(child.as_ref(), child_outcome, paths);
            }
        }
        (None, TaskOutcome::Task(result)) if !result.status.is_failure() => {
            paths.extend(task.output_files());
        }
        _ => {}
    }
}

fn dedup(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}
