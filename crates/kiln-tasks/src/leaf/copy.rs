use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use kiln_core::artifact::ArtifactKind;
use tracing::debug;

use super::{finish, prepare_outputs};
use crate::error::{Result, TaskError};
use crate::result::TaskOutcome;
use crate::task::{ExecutionContext, Task, TaskId};

/// Publishes the linked artifacts of one kind
pub struct CopyArtifactTask {
    id: TaskId,
    /// (source in the object folder, destination in the publish folder)
    pairs: Vec<(PathBuf, PathBuf)>,
}

impl CopyArtifactTask {
    pub fn new(kind: ArtifactKind, pairs: Vec<(PathBuf, PathBuf)>) -> Self {
        Self {
            id: TaskId::new("copy", kind.plural()),
            pairs,
        }
    }

    fn copy_all(&self) -> Result<()> {
        prepare_outputs(self.pairs.iter().map(|(_, to)| to.as_path()))?;
        for (from, to) in &self.pairs {
            if !from.exists() {
                return Err(TaskError::MissingInput(from.clone()));
            }
            // replace rather than overwrite in place, so a running binary
            // is never truncated
            if to.symlink_metadata().is_ok() {
                std::fs::remove_file(to).map_err(|e| TaskError::io(to, e))?;
            }
            debug!("Copying {} to {}", from.display(), to.display());
            std::fs::copy(from, to).map_err(|e| TaskError::io(to, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Task for CopyArtifactTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn description(&self) -> String {
        format!("Copying {}", self.id.subject)
    }

    fn input_files(&self) -> Vec<PathBuf> {
        self.pairs.iter().map(|(from, _)| from.clone()).collect()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        self.pairs.iter().map(|(_, to)| to.clone()).collect()
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TaskOutcome {
        let start = Instant::now();
        finish(
            &self.id,
            &format!("Copying {}", self.id.subject),
            start,
            self.copy_all(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TaskStatus;
    use crate::testutil::write_file;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let from = write_file(temp.path(), "out/clang-release/INET");
        std::fs::write(&from, "new").unwrap();
        let to = write_file(temp.path(), "bin/INET");
        std::fs::write(&to, "old").unwrap();
        let task = CopyArtifactTask::new(ArtifactKind::Executable, vec![(from, to.clone())]);

        let outcome = task.execute(&ExecutionContext::default()).await;

        assert_eq!(outcome.status(), TaskStatus::Done);
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_copy_creates_publish_folder() {
        let temp = TempDir::new().unwrap();
        let from = write_file(temp.path(), "out/clang-release/libINET.so");
        let to = temp.path().join("lib/libINET.so");
        let task = CopyArtifactTask::new(ArtifactKind::DynamicLibrary, vec![(from, to.clone())]);

        let outcome = task.execute(&ExecutionContext::default()).await;

        assert_eq!(outcome.status(), TaskStatus::Done);
        assert!(to.exists());
        assert_eq!(task.id().subject, "dynamic libraries");
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_with_path() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("out/clang-release/INET");
        let to = temp.path().join("bin/INET");
        let task = CopyArtifactTask::new(ArtifactKind::Executable, vec![(from, to)]);

        let outcome = task.execute(&ExecutionContext::default()).await;

        let result = outcome.as_result().unwrap();
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result
            .reason
            .as_deref()
            .unwrap()
            .contains("out/clang-release/INET"));
    }
}
