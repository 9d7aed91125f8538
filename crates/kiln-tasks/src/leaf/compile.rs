use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{finish, prepare_outputs};
use crate::result::TaskOutcome;
use crate::task::{ExecutionContext, Task, TaskId};
use crate::toolchain::{CompileJob, Toolchain};

/// Compiles one `.cc` file into an object file.
///
/// Dependency files are not read, so every header of the project is
/// treated as an input of every translation unit.
pub struct CppCompileTask {
    id: TaskId,
    job: CompileJob,
    headers: Arc<[PathBuf]>,
    toolchain: Arc<dyn Toolchain>,
}

impl CppCompileTask {
    pub fn new(
        subject: impl Into<String>,
        job: CompileJob,
        headers: Arc<[PathBuf]>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            id: TaskId::new("cxx", subject),
            job,
            headers,
            toolchain,
        }
    }
}

#[async_trait]
impl Task for CppCompileTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn description(&self) -> String {
        format!("Compiling {}", self.id.subject)
    }

    fn input_files(&self) -> Vec<PathBuf> {
        let mut inputs = Vec::with_capacity(self.headers.len() + 1);
        inputs.push(self.job.source.clone());
        inputs.extend(self.headers.iter().cloned());
        inputs
    }

    fn output_files(&self) -> Vec<PathBuf> {
        vec![self.job.object.clone()]
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();
        let result = match prepare_outputs([self.job.object.as_path()]) {
            Ok(()) => self.toolchain.compile_native(&self.job).await,
            Err(e) => Err(e),
        };
        finish(&self.id, &format!("Compiling {}", self.id.subject), start, result)
    }
}
