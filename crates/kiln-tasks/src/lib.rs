//! kiln Tasks - Incremental task engine
//!
//! This crate provides the task model, the timestamp-based staleness rule,
//! composite execution (sequential or bounded-concurrent), result aggregation
//! and the fixed message-compile → compile → link → copy stage pipeline.

pub mod composite;
pub mod error;
pub mod leaf;
pub mod makefile;
pub mod pipeline;
pub mod reporter;
pub mod result;
pub mod staleness;
pub mod task;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testutil;

pub use composite::CompositeTask;
pub use error::{Result, TaskError};
pub use makefile::{build_with_makefile, clean_with_makefile};
pub use pipeline::{build_project, clean_outputs, BuildRequest, StagePipeline};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter};
pub use result::{BuildReport, TaskOutcome, TaskResult, TaskStatus};
pub use staleness::{is_up_to_date, Freshness};
pub use task::{ExecutionContext, Task, TaskId};
pub use toolchain::{CommandToolchain, Toolchain};
