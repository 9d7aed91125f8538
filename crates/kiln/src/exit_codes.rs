//! Exit codes for the CLI

use kiln_core::{ConfigError, KilnError};

use crate::cli::commands::BuildFailed;

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Project discovery error
pub const PROJECT_ERROR: i32 = 3;

/// External tool (make) failed
pub const TOOL_ERROR: i32 = 4;

/// Configuration loaded but holds invalid values
pub const VALIDATION_ERROR: i32 = 5;

/// The build report contains failed tasks
pub const BUILD_FAILED: i32 = 6;

/// Exit code for an error returned by a command
pub fn for_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<BuildFailed>().is_some() {
        return BUILD_FAILED;
    }
    if error.downcast_ref::<kiln_tasks::TaskError>().is_some() {
        return TOOL_ERROR;
    }
    match error.downcast_ref::<KilnError>() {
        Some(KilnError::Config(ConfigError::InvalidValue { .. })) => VALIDATION_ERROR,
        Some(KilnError::Config(_)) => CONFIG_ERROR,
        Some(KilnError::Project(_)) => PROJECT_ERROR,
        _ => ERROR,
    }
}
