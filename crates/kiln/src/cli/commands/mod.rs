//! CLI commands

mod build;
mod clean;
mod completions;
mod init;
mod plan;

pub use build::{BuildCommand, BuildFailed};
pub use clean::CleanCommand;
pub use completions::CompletionsCommand;
pub use init::InitCommand;
pub use plan::PlanCommand;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use kiln_core::config::{config_root, load_config_or_default};
use kiln_core::{BuildMode, Config, ProjectDescriptor};
use kiln_tasks::CommandToolchain;
use tracing::debug;

/// Build mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Unoptimized build with debug info
    Debug,
    /// Optimized build
    Release,
}

impl From<ModeArg> for BuildMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Debug => BuildMode::Debug,
            ModeArg::Release => BuildMode::Release,
        }
    }
}

/// Which engine performs the build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Incremental task engine
    #[default]
    Tasks,
    /// The project's own Makefile
    Make,
}

/// Configuration and scanned project of the working directory
pub struct Workspace {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub project: ProjectDescriptor,
}

impl Workspace {
    /// Load the configuration found from `dir` upwards and scan the project
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let (config, config_path) =
            load_config_or_default(dir).context("Failed to load configuration")?;
        let root = config_path
            .as_deref()
            .map(config_root)
            .unwrap_or_else(|| dir.to_path_buf());
        debug!(root = %root.display(), config = ?config_path, "loaded workspace");

        let project = ProjectDescriptor::from_config(&root, &config.project)
            .with_context(|| format!("Failed to read project at {}", root.display()))?;

        Ok(Self {
            config,
            config_path,
            project,
        })
    }

    /// Load from the current directory
    pub fn current() -> anyhow::Result<Self> {
        Self::load(&std::env::current_dir()?)
    }

    /// Mode from the command line, falling back to the configured one
    pub fn mode(&self, arg: Option<ModeArg>) -> BuildMode {
        arg.map(BuildMode::from).unwrap_or(self.config.build.mode)
    }

    /// Toolchain spawning the configured programs
    pub fn toolchain(&self) -> Arc<CommandToolchain> {
        Arc::new(CommandToolchain::new(self.config.toolchain.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Project;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_uses_config_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/net")).unwrap();
        std::fs::write(temp.path().join("src/net/A.msg"), "").unwrap();
        std::fs::write(
            temp.path().join("kiln.yaml"),
            "project:\n  name: demo\n  executables: [demo]\nbuild:\n  mode: debug\n",
        )
        .unwrap();

        let workspace = Workspace::load(&temp.path().join("src/net")).unwrap();

        assert_eq!(workspace.project.name(), "demo");
        assert_eq!(workspace.project.root(), temp.path());
        assert_eq!(workspace.project.msg_files(), [PathBuf::from("src/net/A.msg")]);
        assert_eq!(workspace.mode(None), BuildMode::Debug);
        assert_eq!(workspace.mode(Some(ModeArg::Release)), BuildMode::Release);
    }

    #[test]
    fn test_workspace_without_sources_fails() {
        let temp = TempDir::new().unwrap();
        let err = Workspace::load(temp.path()).err().unwrap();
        assert!(format!("{:#}", err).contains("Source folder not found"));
    }
}
