//! Clean command

use clap::Args;
use tracing::info;

use kiln_core::Project;
use kiln_tasks::{clean_outputs, clean_with_makefile};

use super::{EngineArg, ModeArg, Workspace};
use crate::cli::output::{self, path_style};
use crate::cli::{Cli, OutputFormat};

/// Remove build outputs of one mode
#[derive(Debug, Args)]
pub struct CleanCommand {
    /// Build mode to clean (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Build engine
    #[arg(long, value_enum, default_value = "tasks")]
    pub engine: EngineArg,
}

impl CleanCommand {
    /// Execute the clean command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(mode = ?self.mode, engine = ?self.engine, "executing clean command");
        let workspace = Workspace::current()?;
        let mode = workspace.mode(self.mode);

        if self.engine == EngineArg::Make {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(clean_with_makefile(&workspace.project, mode, !cli.verbose))?;
            if cli.is_text() {
                output::success(&format!("Cleaned {} with make", workspace.project.name()));
            }
            return Ok(());
        }

        let removed = clean_outputs(&workspace.project, &workspace.config.toolchain.name, mode)?;

        match cli.format {
            OutputFormat::Json => {
                let paths: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
                println!("{}", serde_json::to_string_pretty(&paths)?);
            }
            OutputFormat::Text if !cli.quiet => {
                if cli.verbose {
                    for path in &removed {
                        println!("  {}", path_style().apply_to(path.display()));
                    }
                }
                output::success(&format!(
                    "Removed {} {} outputs of {}",
                    removed.len(),
                    mode,
                    workspace.project.name()
                ));
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }
}
