use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{finish, prepare_outputs};
use crate::result::TaskOutcome;
use crate::task::{ExecutionContext, Task, TaskId};
use crate::toolchain::{LinkJob, Toolchain};

/// Links every object file of the build into one artifact
pub struct LinkTask {
    id: TaskId,
    job: LinkJob,
    toolchain: Arc<dyn Toolchain>,
}

impl LinkTask {
    /// `name` is the target name before prefix, suffix and extension
    pub fn new(name: &str, job: LinkJob, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            id: TaskId::new("link", format!("{} {}", job.kind, name)),
            job,
            toolchain,
        }
    }
}

#[async_trait]
impl Task for LinkTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn description(&self) -> String {
        format!("Linking {}", self.job.output.display())
    }

    fn input_files(&self) -> Vec<PathBuf> {
        self.job.objects.clone()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        vec![self.job.output.clone()]
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();
        let result = match prepare_outputs([self.job.output.as_path()]) {
            Ok(()) => self.toolchain.link(&self.job).await,
            Err(e) => Err(e),
        };
        finish(
            &self.id,
            &format!("Linking {}", self.job.output.display()),
            start,
            result,
        )
    }
}
