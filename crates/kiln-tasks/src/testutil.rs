//! Helpers shared by unit tests

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;

use crate::error::{Result, TaskError};
use crate::result::{TaskOutcome, TaskResult};
use crate::task::{ExecutionContext, Task, TaskId};
use crate::toolchain::{CompileJob, LinkJob, MsgJob, Toolchain};

/// Create an empty file (and its parent directories) under `root`
pub fn write_file(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, "").unwrap();
    path
}

/// Move a file's modification time `age` into the past
pub fn set_age(path: &Path, age: Duration) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn produce(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| TaskError::io(path, e))
}

/// Leaf task with scripted behaviour
pub struct ScriptedTask {
    id: TaskId,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    fail: bool,
    panic: bool,
    delay: Duration,
    backdate: Option<Duration>,
    runs: AtomicUsize,
}

impl ScriptedTask {
    pub fn new(name: &str, inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Self {
        Self {
            id: TaskId::new("test", name),
            inputs,
            outputs,
            fail: false,
            panic: false,
            delay: Duration::ZERO,
            backdate: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }

    /// Panic instead of returning an outcome
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write outputs with a modification time this far in the past
    pub fn backdating(mut self, age: Duration) -> Self {
        self.backdate = Some(age);
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn input_files(&self) -> Vec<PathBuf> {
        self.inputs.clone()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        self.outputs.clone()
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic {
            panic!("scripted panic in {}", self.id);
        }

        if self.fail {
            let subject = self
                .inputs
                .first()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return TaskOutcome::Task(TaskResult::failed(
                self.id.clone(),
                format!("error building {}", subject),
                start.elapsed(),
            ));
        }

        for output in &self.outputs {
            if let Err(e) = produce(output, "") {
                return TaskOutcome::Task(TaskResult::failed(
                    self.id.clone(),
                    e.to_string(),
                    start.elapsed(),
                ));
            }
            if let Some(age) = self.backdate {
                set_age(output, age);
            }
        }
        TaskOutcome::Task(TaskResult::done(self.id.clone(), start.elapsed()))
    }
}

/// One recorded toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Msg(PathBuf),
    Compile(PathBuf),
    Link(PathBuf),
}

/// Toolchain that writes placeholder outputs and records what it was asked
/// to do, optionally failing on chosen sources
#[derive(Default)]
pub struct FakeToolchain {
    calls: Mutex<Vec<Call>>,
    fail_on: Vec<String>,
    msg_delay: Duration,
    counter: AtomicUsize,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any action whose source file name equals `file_name`
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on.push(file_name.to_string());
        self
    }

    /// Slow down message compilation
    pub fn with_msg_delay(mut self, delay: Duration) -> Self {
        self.msg_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn compiled(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Compile(source) => source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, source: &Path) -> Result<()> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.contains(&name) {
            return Err(TaskError::CommandFailed {
                command: format!("fake {}", source.display()),
                code: 1,
                stderr: format!("{}: error: scripted failure", source.display()),
            });
        }
        Ok(())
    }

    fn stamp(&self) -> String {
        self.counter.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    fn name(&self) -> &str {
        "fake"
    }

    async fn compile_message(&self, job: &MsgJob) -> Result<()> {
        self.record(Call::Msg(job.source.clone()));
        if !self.msg_delay.is_zero() {
            tokio::time::sleep(self.msg_delay).await;
        }
        self.check(&job.source)?;
        let stamp = self.stamp();
        for output in job.outputs() {
            produce(&output, &stamp)?;
        }
        Ok(())
    }

    async fn compile_native(&self, job: &CompileJob) -> Result<()> {
        self.record(Call::Compile(job.source.clone()));
        self.check(&job.source)?;
        produce(&job.object, &self.stamp())
    }

    async fn link(&self, job: &LinkJob) -> Result<()> {
        self.record(Call::Link(job.output.clone()));
        for object in &job.objects {
            if !object.exists() {
                return Err(TaskError::MissingInput(object.clone()));
            }
        }
        produce(&job.output, &self.stamp())
    }
}
