//! Init command

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use console::style;
use tracing::info;

use kiln_core::config::defaults::{
    default_config_toml, DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML,
};

use crate::cli::Cli;

/// Configuration file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Toml,
}

/// Initialize a new kiln configuration
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Configuration format
    #[arg(long = "config-format", value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, format = ?self.config_format, "executing init command");
        let cwd = std::env::current_dir()?;
        let config_path = self.write_config(&cwd)?;

        if !cli.quiet {
            println!(
                "{} Created configuration at {}",
                style("✓").green().bold(),
                style(config_path.display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!("  1. Edit {} to describe your sources and targets", config_path.display());
            println!("  2. Run {} to see the build stages", style("kiln plan").cyan());
            println!("  3. Run {} to build", style("kiln build").cyan());
        }

        Ok(())
    }

    fn write_config(&self, dir: &std::path::Path) -> anyhow::Result<PathBuf> {
        let default_name = match self.config_format {
            ConfigFormat::Yaml => DEFAULT_CONFIG_YAML,
            ConfigFormat::Toml => DEFAULT_CONFIG_TOML,
        };
        let config_path = self
            .output
            .clone()
            .unwrap_or_else(|| dir.join(default_name));

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Configuration file already exists at {}. Use --force to overwrite.",
                config_path.display()
            );
        }

        let content = match self.config_format {
            ConfigFormat::Yaml => DEFAULT_CONFIG_TEMPLATE.to_string(),
            ConfigFormat::Toml => default_config_toml(),
        };
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::config::load_config;
    use tempfile::TempDir;

    fn command(format: ConfigFormat, force: bool) -> InitCommand {
        InitCommand {
            force,
            config_format: format,
            output: None,
        }
    }

    #[test]
    fn test_writes_loadable_yaml() {
        let temp = TempDir::new().unwrap();
        let path = command(ConfigFormat::Yaml, false)
            .write_config(temp.path())
            .unwrap();

        assert_eq!(path, temp.path().join("kiln.yaml"));
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn test_writes_loadable_toml() {
        let temp = TempDir::new().unwrap();
        let path = command(ConfigFormat::Toml, false)
            .write_config(temp.path())
            .unwrap();

        assert_eq!(path, temp.path().join("kiln.toml"));
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("kiln.yaml"), "custom").unwrap();

        assert!(command(ConfigFormat::Yaml, false)
            .write_config(temp.path())
            .is_err());
        assert!(command(ConfigFormat::Yaml, true)
            .write_config(temp.path())
            .is_ok());
    }
}
