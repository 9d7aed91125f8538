use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{finish, prepare_outputs};
use crate::result::TaskOutcome;
use crate::task::{ExecutionContext, Task, TaskId};
use crate::toolchain::{MsgJob, Toolchain};

/// Generates `X_m.cc` and `X_m.h` from `X.msg`
pub struct MsgCompileTask {
    id: TaskId,
    job: MsgJob,
    toolchain: Arc<dyn Toolchain>,
}

impl MsgCompileTask {
    /// `subject` is the project-relative path shown in reports
    pub fn new(subject: impl Into<String>, job: MsgJob, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            id: TaskId::new("msgc", subject),
            job,
            toolchain,
        }
    }
}

#[async_trait]
impl Task for MsgCompileTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn description(&self) -> String {
        format!("Generating code from {}", self.id.subject)
    }

    fn input_files(&self) -> Vec<PathBuf> {
        vec![self.job.source.clone()]
    }

    fn output_files(&self) -> Vec<PathBuf> {
        self.job.outputs()
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();
        let outputs = self.job.outputs();
        let result = match prepare_outputs(outputs.iter().map(PathBuf::as_path)) {
            Ok(()) => self.toolchain.compile_message(&self.job).await,
            Err(e) => Err(e),
        };
        finish(&self.id, &format!("Compiling {}", self.id.subject), start, result)
    }
}
