//! Plan command - Show what a build would do without running it

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use kiln_core::Project;
use kiln_tasks::staleness;
use kiln_tasks::{BuildRequest, StagePipeline, Task};

use super::{ModeArg, Workspace};
use crate::cli::output;
use crate::cli::{Cli, OutputFormat};

/// Show the build stages and whether they are up to date
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Build mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,
}

/// One stage of the plan
#[derive(Debug, Serialize)]
pub struct StagePlan {
    pub id: String,
    pub description: String,
    pub units: usize,
    pub stale_units: usize,
    pub up_to_date: bool,
    pub reason: String,
}

/// Freshness of every stage of a pipeline
pub fn plan_stages(pipeline: &StagePipeline) -> Vec<StagePlan> {
    pipeline
        .stages()
        .iter()
        .map(|stage| {
            let freshness = staleness::check(&stage.input_files(), &stage.output_files());
            let units = stage.children().unwrap_or_default();
            let stale_units = units
                .iter()
                .filter(|unit| !staleness::is_up_to_date(&unit.input_files(), &unit.output_files()))
                .count();
            StagePlan {
                id: stage.id().to_string(),
                description: stage.description(),
                units: units.len(),
                stale_units,
                up_to_date: freshness.is_up_to_date(),
                reason: freshness.to_string(),
            }
        })
        .collect()
}

impl PlanCommand {
    /// Execute the plan command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(mode = ?self.mode, "executing plan command");
        let workspace = Workspace::current()?;
        let mut request = BuildRequest::from_config(&workspace.config.build);
        request.mode = workspace.mode(self.mode);

        let pipeline = StagePipeline::new(&workspace.project, workspace.toolchain(), &request);
        let stages = plan_stages(&pipeline);

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&stages)?);
            return Ok(());
        }
        if cli.quiet {
            return Ok(());
        }

        println!(
            "{} {} ({})",
            style("Plan for").bold(),
            style(workspace.project.name()).cyan(),
            request.mode
        );
        if let Some(path) = &workspace.config_path {
            println!("{}", output::key_value("config", &path.display().to_string()));
        }
        println!(
            "{}",
            output::key_value("objects", &pipeline.object_dir().display().to_string())
        );
        println!();

        if stages.is_empty() {
            output::info("Nothing to build");
        }
        for stage in &stages {
            let marker = if stage.up_to_date {
                style("up to date".to_string()).dim()
            } else {
                style(format!("{}/{} stale", stage.stale_units, stage.units)).yellow()
            };
            println!("  {:<24} {}", stage.id, marker);
            if cli.verbose && !stage.up_to_date {
                println!("    {}", style(&stage.reason).dim());
            }
        }

        let toolchain = &workspace.config.toolchain;
        for tool in [&toolchain.msgc, &toolchain.cxx, &toolchain.ar] {
            if which::which(tool).is_err() {
                output::warning(&format!("{} not found in PATH", tool));
            }
        }

        Ok(())
    }
}
