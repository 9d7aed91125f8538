//! Build command - Build the project with the task engine or its Makefile

use std::sync::Arc;

use clap::Args;
use console::style;
use thiserror::Error;
use tracing::info;

use kiln_core::{FailurePolicy, Project};
use kiln_tasks::{
    build_project, build_with_makefile, BuildReport, BuildRequest, TaskEvent, TaskReporter,
    TaskReporterRegistry, TaskStatus,
};

use super::{EngineArg, ModeArg, Workspace};
use crate::cli::output::{self, status_style};
use crate::cli::{Cli, OutputFormat};

/// The build finished with failed tasks
#[derive(Debug, Error)]
#[error("Build failed: {failed} of {total} tasks failed")]
pub struct BuildFailed {
    pub failed: usize,
    pub total: usize,
}

/// Build the project
#[derive(Debug, Args)]
pub struct BuildCommand {
    /// Build mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Build engine
    #[arg(long, value_enum, default_value = "tasks")]
    pub engine: EngineArg,

    /// Run the units of each stage one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Maximum number of concurrently running units
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Run later stages even after a stage failed
    #[arg(short = 'k', long)]
    pub keep_going: bool,
}

impl BuildCommand {
    /// Execute the build command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(mode = ?self.mode, engine = ?self.engine, jobs = ?self.jobs, "executing build command");
        // Run async operation in tokio runtime
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    /// Request derived from configuration and flags
    fn request(&self, workspace: &Workspace) -> anyhow::Result<BuildRequest> {
        let mut request = BuildRequest::from_config(&workspace.config.build);
        request.mode = workspace.mode(self.mode);
        if self.sequential {
            request.concurrent = false;
        }
        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                anyhow::bail!("--jobs must be at least 1");
            }
            request.parallelism = Some(jobs);
        }
        if self.keep_going {
            request.failure_policy = FailurePolicy::Continue;
        }
        Ok(request)
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::current()?;
        let request = self.request(&workspace)?;
        let project = &workspace.project;

        if cli.is_text() {
            println!(
                "{} {} ({})",
                style("Building").bold(),
                style(project.name()).cyan(),
                request.mode
            );
            println!();
        }

        if self.engine == EngineArg::Make {
            build_with_makefile(project, request.mode, cli.quiet || cli.format == OutputFormat::Json)
                .await?;
            if cli.is_text() {
                output::success("Build completed with make");
            }
            return Ok(());
        }

        let mut reporters = TaskReporterRegistry::new();
        if cli.is_text() {
            reporters.register(ConsoleReporter {
                verbose: cli.verbose,
            });
        }

        let report = build_project(
            project,
            workspace.toolchain(),
            &request,
            Arc::new(reporters),
        )
        .await?;

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text if !cli.quiet => print_summary(&report),
            OutputFormat::Text => {}
        }

        if report.status().is_failure() {
            return Err(BuildFailed {
                failed: report.count(TaskStatus::Failed),
                total: report.leaves().len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Prints task progress to the terminal
struct ConsoleReporter {
    verbose: bool,
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::GroupStarted { description, .. } => {
                println!("{}", output::header(description));
            }
            TaskEvent::Started { description, .. } if self.verbose => {
                println!("  {} {}", style("→").blue(), description);
            }
            TaskEvent::Completed { id, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    id,
                    style(format!("({:.1}s)", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed { id, error, .. } => {
                println!("  {} {}", style("✗").red().bold(), id);
                for line in error.lines() {
                    println!("      {}", style(line).red());
                }
            }
            TaskEvent::Skipped { id, reason } if self.verbose => {
                println!("  {} {} {}", style("-").dim(), id, style(reason).dim());
            }
            _ => {}
        }
    }
}

fn print_summary(report: &BuildReport) {
    let status = report.status();
    println!();
    println!("{}", output::header("Stages"));
    for stage in &report.children {
        println!(
            "  {:<24} {}",
            stage.task().to_string(),
            status_style(stage.status()).apply_to(stage.status())
        );
    }
    println!();
    println!(
        "{} {} done, {} skipped, {} failed in {:.1}s",
        status_style(status).apply_to(status),
        report.count(TaskStatus::Done),
        report.count(TaskStatus::Skip),
        report.count(TaskStatus::Failed),
        report.duration.as_secs_f64()
    );

    for failure in report.failures() {
        output::error(&format!(
            "{}: {}",
            failure.task,
            failure.reason.as_deref().unwrap_or("failed")
        ));
    }
}
