//! Error types for task actions

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using TaskError
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors raised by external actions.
///
/// Leaf tasks never propagate these; they become the diagnostic of a FAILED
/// result. Only entry points outside the task tree (the make proxy, pipeline
/// construction, clean) return them.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The program could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited unsuccessfully
    #[error("Command exited with code {code}: {command}{}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// A declared input does not exist
    #[error("Input file not found: {0}")]
    MissingInput(PathBuf),

    /// Filesystem error on a specific path
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_includes_stderr() {
        let err = TaskError::CommandFailed {
            command: "clang++ -c src/B.cc".to_string(),
            code: 1,
            stderr: "src/B.cc:3:1: error: expected ';'\n".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("code 1"));
        assert!(text.contains("src/B.cc:3:1"));
    }

    #[test]
    fn test_command_failed_without_stderr() {
        let err = TaskError::CommandFailed {
            command: "make".to_string(),
            code: 2,
            stderr: "  ".to_string(),
        };
        assert_eq!(err.to_string(), "Command exited with code 2: make");
    }
}
