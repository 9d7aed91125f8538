//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_project(config)?;
    validate_toolchain(config)?;
    validate_build(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> crate::error::KilnError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
    .into()
}

fn validate_project(config: &Config) -> Result<()> {
    let project = &config.project;

    if project.name.trim().is_empty() {
        return Err(invalid("project.name", "project name cannot be empty"));
    }

    if project.source_dirs.is_empty() {
        return Err(invalid(
            "project.source_dirs",
            "at least one source folder is required",
        ));
    }

    for pattern in &project.exclude {
        if let Err(e) = glob::Pattern::new(pattern) {
            return Err(invalid("project.exclude", format!("'{}': {}", pattern, e)));
        }
    }

    for kind in &project.build_kinds {
        if project.targets(*kind).is_empty() {
            return Err(invalid(
                "project.build_kinds",
                format!("{} requested but no {} are configured", kind, kind.plural()),
            ));
        }
    }

    Ok(())
}

fn validate_toolchain(config: &Config) -> Result<()> {
    let toolchain = &config.toolchain;

    for (field, value) in [
        ("toolchain.name", &toolchain.name),
        ("toolchain.msgc", &toolchain.msgc),
        ("toolchain.cxx", &toolchain.cxx),
        ("toolchain.ar", &toolchain.ar),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(field, "cannot be empty"));
        }
    }

    Ok(())
}

fn validate_build(config: &Config) -> Result<()> {
    if config.build.jobs == Some(0) {
        return Err(invalid("build.jobs", "must be greater than zero"));
    }
    Ok(())
}
