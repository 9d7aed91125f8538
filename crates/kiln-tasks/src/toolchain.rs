//! External compiler, linker and message compiler invocation

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use kiln_core::artifact::{ArtifactKind, BuildMode};
use kiln_core::config::ToolchainConfig;
use kiln_core::project::generated_files;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, TaskError};

/// Compile one message definition into `X_m.cc` and `X_m.h`
#[derive(Debug, Clone)]
pub struct MsgJob {
    /// Project root, used as the working directory
    pub root: PathBuf,
    /// `.msg` file
    pub source: PathBuf,
    /// Directories searched for imported message files
    pub include_dirs: Vec<PathBuf>,
}

impl MsgJob {
    /// Files the message compiler writes
    pub fn outputs(&self) -> Vec<PathBuf> {
        let (cc, h) = generated_files(&self.source);
        vec![cc, h]
    }
}

/// Compile one translation unit into an object file
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub root: PathBuf,
    pub source: PathBuf,
    pub object: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub mode: BuildMode,
}

/// Link object files into one artifact
#[derive(Debug, Clone)]
pub struct LinkJob {
    pub root: PathBuf,
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    pub kind: ArtifactKind,
    pub mode: BuildMode,
}

/// Tools used by the leaf tasks.
///
/// Implementations must not touch files other than the job's outputs.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Name used in the mode-qualified output directory (e.g. "clang")
    fn name(&self) -> &str;

    /// Run the message compiler
    async fn compile_message(&self, job: &MsgJob) -> Result<()>;

    /// Run the C++ compiler
    async fn compile_native(&self, job: &CompileJob) -> Result<()>;

    /// Run the linker or archiver
    async fn link(&self, job: &LinkJob) -> Result<()>;
}

/// Toolchain that spawns the configured programs
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    config: ToolchainConfig,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Arguments for the message compiler
    pub fn msgc_args(&self, job: &MsgJob) -> Vec<String> {
        let mut args = self.config.msgc_flags.clone();
        args.push("-s".to_string());
        args.push("_m.cc".to_string());
        args.extend(include_args(&job.include_dirs));
        args.push(path_arg(&job.source));
        args
    }

    /// Arguments for compiling one source file
    pub fn compile_args(&self, job: &CompileJob) -> Vec<String> {
        let mut args = vec!["-c".to_string()];
        args.extend(self.config.cxxflags.iter().cloned());
        args.extend(self.config.mode_flags(job.mode).iter().cloned());
        args.extend(include_args(&job.include_dirs));
        args.push("-o".to_string());
        args.push(path_arg(&job.object));
        args.push(path_arg(&job.source));
        args
    }

    /// Program and arguments for producing one artifact
    pub fn link_command(&self, job: &LinkJob) -> (String, Vec<String>) {
        let objects = job.objects.iter().map(|o| path_arg(o));
        match job.kind {
            ArtifactKind::StaticLibrary => {
                let mut args = vec!["rcs".to_string(), path_arg(&job.output)];
                args.extend(objects);
                (self.config.ar.clone(), args)
            }
            ArtifactKind::Executable | ArtifactKind::DynamicLibrary => {
                let mut args = Vec::new();
                if job.kind == ArtifactKind::DynamicLibrary {
                    args.push("-shared".to_string());
                }
                args.push("-o".to_string());
                args.push(path_arg(&job.output));
                args.extend(objects);
                args.extend(self.config.ldflags.iter().cloned());
                (self.config.cxx.clone(), args)
            }
        }
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn compile_message(&self, job: &MsgJob) -> Result<()> {
        run_command(&self.config.msgc, &self.msgc_args(job), &job.root).await?;
        Ok(())
    }

    async fn compile_native(&self, job: &CompileJob) -> Result<()> {
        run_command(&self.config.cxx, &self.compile_args(job), &job.root).await?;
        Ok(())
    }

    async fn link(&self, job: &LinkJob) -> Result<()> {
        if job.kind == ArtifactKind::StaticLibrary && job.output.exists() {
            // ar appends to an existing archive
            std::fs::remove_file(&job.output).map_err(|e| TaskError::io(&job.output, e))?;
        }
        let (program, args) = self.link_command(job);
        run_command(&program, &args, &job.root).await?;
        Ok(())
    }
}

/// Run a program to completion, returning its stdout
pub async fn run_command(program: &str, args: &[String], cwd: &Path) -> Result<String> {
    debug!("Running {} with args: {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| TaskError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(TaskError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            stderr: if stderr.trim().is_empty() { stdout } else { stderr },
        });
    }

    Ok(stdout)
}

fn include_args(dirs: &[PathBuf]) -> Vec<String> {
    dirs.iter().map(|d| format!("-I{}", d.display())).collect()
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
