//! The fixed build pipeline: message compile → native compile → link → copy

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_core::artifact::{ArtifactKind, BuildMode};
use kiln_core::config::{BuildConfig, FailurePolicy};
use kiln_core::project::{generated_files, Project};
use tracing::{info, instrument};

use crate::composite::CompositeTask;
use crate::error::{Result, TaskError};
use crate::leaf::{CopyArtifactTask, CppCompileTask, LinkTask, MsgCompileTask};
use crate::reporter::{TaskEvent, TaskReporter};
use crate::result::{BuildReport, TaskOutcome, TaskStatus};
use crate::task::{available_parallelism, ExecutionContext, Task, TaskId};
use crate::toolchain::{CompileJob, LinkJob, MsgJob, Toolchain};

/// Parameters of one build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub mode: BuildMode,
    /// Run the units of each stage concurrently
    pub concurrent: bool,
    /// Upper bound on concurrently running units, hardware threads if unset
    pub parallelism: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            mode: BuildMode::Release,
            concurrent: true,
            parallelism: None,
            failure_policy: FailurePolicy::Halt,
        }
    }
}

impl BuildRequest {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            mode: config.mode,
            concurrent: config.concurrent,
            parallelism: config.jobs,
            failure_policy: config.failure_policy,
        }
    }

    /// Effective parallelism
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(available_parallelism).max(1)
    }
}

/// Mode-qualified folder for object files and linked artifacts,
/// e.g. `<root>/out/clang-release`
pub fn object_dir(project: &dyn Project, toolchain_name: &str, mode: BuildMode) -> PathBuf {
    project
        .full_path(project.out_dir())
        .join(format!("{}-{}", toolchain_name, mode))
}

/// Folder an artifact kind is published to
fn publish_dir(project: &dyn Project, kind: ArtifactKind) -> PathBuf {
    if kind.is_library() {
        project.full_path(project.library_dir())
    } else {
        project.full_path(project.bin_dir())
    }
}

/// The task tree of one project build
pub struct StagePipeline {
    root: CompositeTask,
    object_dir: PathBuf,
}

impl StagePipeline {
    /// Build the task tree. Nothing is written to disk.
    #[instrument(skip_all, fields(project = %project.name(), mode = %request.mode))]
    pub fn new(
        project: &dyn Project,
        toolchain: Arc<dyn Toolchain>,
        request: &BuildRequest,
    ) -> Self {
        let mode = request.mode;
        let object_dir = object_dir(project, toolchain.name(), mode);

        let root = project.root().to_path_buf();
        let include_dirs: Vec<PathBuf> = project
            .include_dirs()
            .iter()
            .map(|d| project.full_path(d))
            .collect();
        let stage = |kind: &str, description: String, children: Vec<Arc<dyn Task>>| {
            Arc::new(
                CompositeTask::new(TaskId::new(project.name(), kind), children)
                    .with_description(description)
                    .concurrent(request.concurrent),
            ) as Arc<dyn Task>
        };

        let mut stages = Vec::new();

        let msg_tasks: Vec<Arc<dyn Task>> = project
            .msg_files()
            .iter()
            .map(|msg| {
                let job = MsgJob {
                    root: root.clone(),
                    source: project.full_path(msg),
                    include_dirs: include_dirs.clone(),
                };
                Arc::new(MsgCompileTask::new(subject(msg), job, toolchain.clone())) as Arc<dyn Task>
            })
            .collect();
        if !msg_tasks.is_empty() {
            stages.push(stage(
                "msg-compile",
                format!("Compiling {} message files", msg_tasks.len()),
                msg_tasks,
            ));
        }

        let mut sources = Vec::new();
        let mut headers: Vec<PathBuf> = project
            .header_files()
            .iter()
            .map(|h| project.full_path(h))
            .collect();
        for msg in project.msg_files() {
            let (cc, h) = generated_files(msg);
            sources.push(cc);
            headers.push(project.full_path(&h));
        }
        sources.extend(project.cpp_files().iter().cloned());
        let headers: Arc<[PathBuf]> = headers.into();

        if !sources.is_empty() {
            let mut objects = Vec::with_capacity(sources.len());
            let compile_tasks: Vec<Arc<dyn Task>> = sources
                .iter()
                .map(|source| {
                    let object = object_dir.join(project.relative_path(source)).with_extension("o");
                    objects.push(object.clone());
                    let job = CompileJob {
                        root: root.clone(),
                        source: project.full_path(source),
                        object,
                        include_dirs: include_dirs.clone(),
                        mode,
                    };
                    Arc::new(CppCompileTask::new(
                        subject(source),
                        job,
                        headers.clone(),
                        toolchain.clone(),
                    )) as Arc<dyn Task>
                })
                .collect();
            stages.push(stage(
                "compile",
                format!("Compiling {} source files", compile_tasks.len()),
                compile_tasks,
            ));

            let mut link_tasks: Vec<Arc<dyn Task>> = Vec::new();
            for name in project.executables() {
                for &kind in project.build_kinds() {
                    let job = LinkJob {
                        root: root.clone(),
                        objects: objects.clone(),
                        output: object_dir.join(kind.file_name(name, mode)),
                        kind,
                        mode,
                    };
                    link_tasks.push(Arc::new(LinkTask::new(name, job, toolchain.clone())));
                }
            }
            stages.push(stage(
                "link",
                format!("Linking {} artifacts", link_tasks.len()),
                link_tasks,
            ));

            let copy_tasks: Vec<Arc<dyn Task>> = project
                .build_kinds()
                .iter()
                .map(|&kind| {
                    let destination = publish_dir(project, kind);
                    let pairs = project
                        .targets(kind)
                        .iter()
                        .map(|name| {
                            let file_name = kind.file_name(name, mode);
                            (object_dir.join(&file_name), destination.join(&file_name))
                        })
                        .collect();
                    Arc::new(CopyArtifactTask::new(kind, pairs)) as Arc<dyn Task>
                })
                .collect();
            stages.push(stage(
                "copy",
                "Copying artifacts".to_string(),
                copy_tasks,
            ));
        }

        let root = CompositeTask::sequence(TaskId::new(project.name(), "build"), stages)
            .with_description(format!("Building {} ({})", project.name(), mode))
            .halt_on_failure(request.failure_policy == FailurePolicy::Halt);

        Self { root, object_dir }
    }

    /// Top-level task
    pub fn task(&self) -> &CompositeTask {
        &self.root
    }

    /// Stage composites in execution order
    pub fn stages(&self) -> &[Arc<dyn Task>] {
        self.root.tasks()
    }

    pub fn object_dir(&self) -> &Path {
        &self.object_dir
    }

    /// Create the object folder
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.object_dir).map_err(|e| TaskError::io(&self.object_dir, e))
    }

    /// Run every stage, each one after the previous completed
    pub async fn run(&self, ctx: &ExecutionContext) -> BuildReport {
        match self.root.execute(ctx).await {
            TaskOutcome::Group(report) => report,
            outcome @ TaskOutcome::Task(_) => BuildReport::new(
                self.root.id().clone(),
                self.root.description(),
                vec![outcome],
                Duration::ZERO,
            ),
        }
    }
}

/// Build a project with the task engine
pub async fn build_project(
    project: &dyn Project,
    toolchain: Arc<dyn Toolchain>,
    request: &BuildRequest,
    reporter: Arc<dyn TaskReporter>,
) -> Result<BuildReport> {
    let start = Instant::now();
    info!("Building {} started", project.name());

    let pipeline = StagePipeline::new(project, toolchain, request);
    pipeline.prepare()?;
    let ctx = ExecutionContext::new(reporter.clone()).with_parallelism(request.parallelism());
    let report = pipeline.run(&ctx).await;

    reporter.report(&TaskEvent::AllCompleted {
        total: report.leaves().len(),
        done: report.count(TaskStatus::Done),
        skipped: report.count(TaskStatus::Skip),
        failed: report.count(TaskStatus::Failed),
        duration: start.elapsed(),
    });
    info!("Building {} ended: {}", project.name(), report.status());
    Ok(report)
}

/// Remove the object folder, generated message code and published artifacts
/// of one mode. Returns the paths removed.
#[instrument(skip_all, fields(project = %project.name(), mode = %mode))]
pub fn clean_outputs(
    project: &dyn Project,
    toolchain_name: &str,
    mode: BuildMode,
) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let object_dir = object_dir(project, toolchain_name, mode);
    if object_dir.exists() {
        std::fs::remove_dir_all(&object_dir).map_err(|e| TaskError::io(&object_dir, e))?;
        removed.push(object_dir);
    }

    let mut files = Vec::new();
    for msg in project.msg_files() {
        let (cc, h) = generated_files(msg);
        files.push(project.full_path(&cc));
        files.push(project.full_path(&h));
    }
    for &kind in project.build_kinds() {
        let destination = publish_dir(project, kind);
        for name in project.targets(kind) {
            files.push(destination.join(kind.file_name(name, mode)));
        }
    }

    for file in files {
        if file.symlink_metadata().is_ok() {
            std::fs::remove_file(&file).map_err(|e| TaskError::io(&file, e))?;
            removed.push(file);
        }
    }

    info!("Removed {} paths", removed.len());
    Ok(removed)
}

fn subject(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::result::UPSTREAM_FAILED;
    use crate::staleness::modification_time;
    use crate::testutil::{set_age, write_file, Call, FakeToolchain};
    use kiln_core::project::ProjectDescriptor;
    use tempfile::TempDir;

    /// Project with `src/A.msg` and `src/B.cc`, sources aged into the past
    fn demo_project(root: &Path) -> ProjectDescriptor {
        for file in ["src/A.msg", "src/B.cc", "src/B.h"] {
            let path = write_file(root, file);
            set_age(&path, Duration::from_secs(3600));
        }
        ProjectDescriptor::new("demo", root)
            .with_msg_files(vec![PathBuf::from("src/A.msg")])
            .with_cpp_files(vec![PathBuf::from("src/B.cc")])
            .with_header_files(vec![PathBuf::from("src/B.h")])
            .with_include_dirs(vec![PathBuf::from("src")])
            .with_targets(ArtifactKind::Executable, vec!["demo".to_string()])
            .with_build_kinds(vec![ArtifactKind::Executable])
    }

    async fn build(
        project: &ProjectDescriptor,
        toolchain: &Arc<FakeToolchain>,
        request: &BuildRequest,
    ) -> BuildReport {
        let reporter = Arc::new(CollectingReporter::default());
        build_project(project, toolchain.clone(), request, reporter)
            .await
            .unwrap()
    }

    fn stage_status(report: &BuildReport, stage: &str) -> TaskStatus {
        report
            .child(&TaskId::new("demo", stage))
            .map(TaskOutcome::status)
            .unwrap()
    }

    #[test]
    fn test_pipeline_shape() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path())
            .with_build_kinds(vec![ArtifactKind::Executable, ArtifactKind::StaticLibrary])
            .with_targets(ArtifactKind::StaticLibrary, vec!["demo".to_string()]);

        let pipeline =
            StagePipeline::new(&project, Arc::new(FakeToolchain::new()), &BuildRequest::default());

        let kinds: Vec<&str> = pipeline.stages().iter().map(|s| s.id().kind.as_str()).collect();
        assert_eq!(kinds, vec!["msg-compile", "compile", "link", "copy"]);
        assert!(pipeline.object_dir().ends_with("out/fake-release"));
        assert!(!pipeline.object_dir().exists());

        let compile = pipeline.stages()[1].children().unwrap();
        assert_eq!(compile.len(), 2);
        assert_eq!(compile[0].id(), &TaskId::new("cxx", "src/A_m.cc"));
        assert_eq!(
            compile[0].output_files(),
            vec![temp.path().join("out/fake-release/src/A_m.o")]
        );
        assert!(compile[1]
            .input_files()
            .contains(&temp.path().join("src/A_m.h")));

        let link = pipeline.stages()[2].children().unwrap();
        assert_eq!(link.len(), 2);
        assert_eq!(
            link[1].output_files(),
            vec![temp.path().join("out/fake-release/libdemo.a")]
        );

        let copy = pipeline.stages()[3].children().unwrap();
        assert_eq!(
            copy[0].output_files(),
            vec![temp.path().join("bin/demo")]
        );
        assert_eq!(
            copy[1].output_files(),
            vec![temp.path().join("lib/libdemo.a")]
        );
    }

    #[test]
    fn test_no_message_files_omits_stage() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "src/B.cc");
        let project = ProjectDescriptor::new("demo", temp.path())
            .with_cpp_files(vec![PathBuf::from("src/B.cc")])
            .with_targets(ArtifactKind::Executable, vec!["demo".to_string()])
            .with_build_kinds(vec![ArtifactKind::Executable]);

        let pipeline =
            StagePipeline::new(&project, Arc::new(FakeToolchain::new()), &BuildRequest::default());

        assert_eq!(pipeline.stages()[0].id().kind, "compile");
        assert_eq!(pipeline.stages().len(), 3);
    }

    #[test]
    fn test_dotted_message_name_maps_to_generated_pair() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "src/Foo.v2.msg");
        let project = ProjectDescriptor::new("demo", temp.path())
            .with_msg_files(vec![PathBuf::from("src/Foo.v2.msg")])
            .with_targets(ArtifactKind::Executable, vec!["demo".to_string()])
            .with_build_kinds(vec![ArtifactKind::Executable]);

        let pipeline =
            StagePipeline::new(&project, Arc::new(FakeToolchain::new()), &BuildRequest::default());

        assert_eq!(
            pipeline.stages()[0].output_files(),
            vec![
                temp.path().join("src/Foo.v2_m.cc"),
                temp.path().join("src/Foo.v2_m.h")
            ]
        );
        let compile = pipeline.stages()[1].children().unwrap();
        assert_eq!(compile[0].id(), &TaskId::new("cxx", "src/Foo.v2_m.cc"));
        assert_eq!(
            compile[0].output_files(),
            vec![temp.path().join("out/fake-release/src/Foo.v2_m.o")]
        );
    }

    #[test]
    fn test_no_sources_has_no_native_stages() {
        let temp = TempDir::new().unwrap();
        let project = ProjectDescriptor::new("empty", temp.path())
            .with_targets(ArtifactKind::Executable, vec!["empty".to_string()])
            .with_build_kinds(vec![ArtifactKind::Executable]);

        let pipeline =
            StagePipeline::new(&project, Arc::new(FakeToolchain::new()), &BuildRequest::default());

        assert!(pipeline.stages().is_empty());
    }

    #[tokio::test]
    async fn test_first_build_runs_every_stage() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());

        let report = build(&project, &toolchain, &BuildRequest::default()).await;

        assert_eq!(report.status(), TaskStatus::Done);
        for stage in ["msg-compile", "compile", "link", "copy"] {
            assert_eq!(stage_status(&report, stage), TaskStatus::Done, "{}", stage);
        }
        assert!(temp.path().join("src/A_m.cc").exists());
        assert!(temp.path().join("out/fake-release/src/B.o").exists());
        assert!(temp.path().join("bin/demo").exists());
    }

    #[tokio::test]
    async fn test_second_build_is_all_skip() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());
        build(&project, &toolchain, &BuildRequest::default()).await;
        let calls = toolchain.calls().len();

        let report = build(&project, &toolchain, &BuildRequest::default()).await;

        assert_eq!(report.status(), TaskStatus::Skip);
        assert_eq!(report.count(TaskStatus::Skip), report.leaves().len());
        assert_eq!(toolchain.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_deleted_object_recompiles_only_its_source() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());
        build(&project, &toolchain, &BuildRequest::default()).await;
        std::fs::remove_file(temp.path().join("out/fake-release/src/B.o")).unwrap();
        let before = toolchain.compiled().len();

        let report = build(&project, &toolchain, &BuildRequest::default()).await;

        assert_eq!(stage_status(&report, "msg-compile"), TaskStatus::Skip);
        assert_eq!(
            report.find(&TaskId::new("cxx", "src/B.cc")).unwrap().status,
            TaskStatus::Done
        );
        assert_eq!(
            report.find(&TaskId::new("cxx", "src/A_m.cc")).unwrap().status,
            TaskStatus::Skip
        );
        assert_eq!(&toolchain.compiled()[before..], ["B.cc"]);
        assert_eq!(stage_status(&report, "link"), TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_edited_source_relinks() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());
        build(&project, &toolchain, &BuildRequest::default()).await;
        let published = temp.path().join("bin/demo");
        let first = modification_time(&published).unwrap();

        let source = temp.path().join("src/B.cc");
        std::fs::write(&source, "int main() { return 1; }").unwrap();
        crate::staleness::touch(&source).unwrap();
        let report = build(&project, &toolchain, &BuildRequest::default()).await;

        assert_eq!(report.status(), TaskStatus::Done);
        assert!(modification_time(&published).unwrap() > first);
    }

    #[tokio::test]
    async fn test_native_compile_waits_for_message_stage() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain =
            Arc::new(FakeToolchain::new().with_msg_delay(Duration::from_millis(50)));
        let reporter = Arc::new(CollectingReporter::default());

        build_project(&project, toolchain, &BuildRequest::default(), reporter.clone())
            .await
            .unwrap();

        let events = reporter.events();
        let msg_finished: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                TaskEvent::Completed { id, .. } if id.kind == "msgc" => Some(i),
                _ => None,
            })
            .collect();
        let first_compile = events
            .iter()
            .position(|e| matches!(e, TaskEvent::Started { id, .. } if id.kind == "cxx"))
            .unwrap();
        assert_eq!(msg_finished.len(), 1);
        assert!(msg_finished.iter().all(|&i| i < first_compile));
    }

    #[tokio::test]
    async fn test_halt_policy_skips_later_stages() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new().failing_on("B.cc"));

        let report = build(&project, &toolchain, &BuildRequest::default()).await;

        assert_eq!(report.status(), TaskStatus::Failed);
        assert_eq!(stage_status(&report, "compile"), TaskStatus::Failed);
        let link = report.find(&TaskId::new("link", "executable demo")).unwrap();
        assert_eq!(link.status, TaskStatus::Skip);
        assert_eq!(link.reason.as_deref(), Some(UPSTREAM_FAILED));
        assert!(!toolchain.calls().iter().any(|c| matches!(c, Call::Link(_))));
        let failure = report.failures()[0];
        assert!(failure.reason.as_deref().unwrap().contains("src/B.cc"));
        // the sibling still compiled
        assert_eq!(
            report.find(&TaskId::new("cxx", "src/A_m.cc")).unwrap().status,
            TaskStatus::Done
        );
    }

    #[tokio::test]
    async fn test_continue_policy_attempts_later_stages() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new().failing_on("B.cc"));
        let request = BuildRequest {
            failure_policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let report = build(&project, &toolchain, &request).await;

        assert_eq!(stage_status(&report, "link"), TaskStatus::Failed);
        assert_eq!(stage_status(&report, "copy"), TaskStatus::Failed);
        assert_eq!(report.failures().len(), 3);
        assert!(toolchain.calls().iter().any(|c| matches!(c, Call::Link(_))));
    }

    #[tokio::test]
    async fn test_sequential_build_matches_concurrent() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());
        let request = BuildRequest {
            concurrent: false,
            parallelism: Some(1),
            ..Default::default()
        };

        let report = build(&project, &toolchain, &request).await;

        assert_eq!(report.status(), TaskStatus::Done);
        assert_eq!(report.count(TaskStatus::Done), report.leaves().len());
    }

    #[tokio::test]
    async fn test_build_completed_event() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let reporter = Arc::new(CollectingReporter::default());

        build_project(
            &project,
            Arc::new(FakeToolchain::new()),
            &BuildRequest::default(),
            reporter.clone(),
        )
        .await
        .unwrap();

        match reporter.events().last().unwrap() {
            TaskEvent::AllCompleted { total, done, failed, .. } => {
                assert_eq!(*total, 5);
                assert_eq!(*done, 5);
                assert_eq!(*failed, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clean_removes_outputs() {
        let temp = TempDir::new().unwrap();
        let project = demo_project(temp.path());
        let toolchain = Arc::new(FakeToolchain::new());
        build(&project, &toolchain, &BuildRequest::default()).await;

        let removed = clean_outputs(&project, "fake", BuildMode::Release).unwrap();

        assert_eq!(removed.len(), 4);
        assert!(!temp.path().join("out/fake-release").exists());
        assert!(!temp.path().join("src/A_m.cc").exists());
        assert!(!temp.path().join("bin/demo").exists());
        assert!(temp.path().join("src/B.cc").exists());
        assert!(clean_outputs(&project, "fake", BuildMode::Release)
            .unwrap()
            .is_empty());
    }
}
