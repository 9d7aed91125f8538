//! Delegating builds to the project's own Makefile

use std::process::Stdio;

use kiln_core::artifact::BuildMode;
use kiln_core::project::Project;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, TaskError};
use crate::task::available_parallelism;

/// Arguments passed to `make`
pub fn make_args(mode: BuildMode, jobs: usize, target: Option<&str>) -> Vec<String> {
    let mut args = vec![
        format!("MODE={}", mode),
        "-j".to_string(),
        jobs.to_string(),
    ];
    if let Some(target) = target {
        args.push(target.to_string());
    }
    args
}

async fn run_make(
    project: &dyn Project,
    mode: BuildMode,
    target: Option<&str>,
    capture_output: bool,
) -> Result<()> {
    let args = make_args(mode, available_parallelism(), target);
    debug!("Running subprocess: make {:?}", args);

    let mut command = Command::new("make");
    command.args(&args).current_dir(project.root());
    if capture_output {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    let output = command.output().await.map_err(|source| TaskError::Spawn {
        program: "make".to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(TaskError::CommandFailed {
            command: format!("make {}", args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

/// Build with `make MODE=<mode> -j <cpus>` in the project root
pub async fn build_with_makefile(
    project: &dyn Project,
    mode: BuildMode,
    capture_output: bool,
) -> Result<()> {
    info!("Building {} started", project.name());
    run_make(project, mode, None, capture_output).await?;
    info!("Building {} ended", project.name());
    Ok(())
}

/// Run the Makefile's `clean` target
pub async fn clean_with_makefile(
    project: &dyn Project,
    mode: BuildMode,
    capture_output: bool,
) -> Result<()> {
    info!("Cleaning {} started", project.name());
    run_make(project, mode, Some("clean"), capture_output).await?;
    info!("Cleaning {} ended", project.name());
    Ok(())
}
