//! Leaf tasks: one external action each

mod compile;
mod copy;
mod link;
mod msg;

pub use compile::CppCompileTask;
pub use copy::CopyArtifactTask;
pub use link::LinkTask;
pub use msg::MsgCompileTask;

use std::path::Path;
use std::time::Instant;

use crate::error::{Result, TaskError};
use crate::result::{TaskOutcome, TaskResult};
use crate::task::TaskId;

/// Create the parent folder of every output
fn prepare_outputs<'a>(outputs: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    for output in outputs {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Turn an action's result into the leaf outcome; `action` names the file
/// acted on in the diagnostic
fn finish(id: &TaskId, action: &str, start: Instant, result: Result<()>) -> TaskOutcome {
    match result {
        Ok(()) => TaskOutcome::Task(TaskResult::done(id.clone(), start.elapsed())),
        Err(e) => TaskOutcome::Task(TaskResult::failed(
            id.clone(),
            format!("{} failed: {}", action, e),
            start.elapsed(),
        )),
    }
}
