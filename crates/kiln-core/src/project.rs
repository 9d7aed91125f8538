//! Project model
//!
//! A project tells the build engine which files exist and where outputs go.
//! The engine only consumes the [`Project`] trait; [`ProjectDescriptor`] is the
//! config-backed implementation that scans source folders on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::artifact::ArtifactKind;
use crate::config::ProjectConfig;
use crate::error::{ProjectError, Result};

/// Extension of message definition files
pub const MSG_EXTENSION: &str = "msg";

/// Extension of native source files
pub const CPP_EXTENSION: &str = "cc";

/// Extension of header files
pub const HEADER_EXTENSION: &str = "h";

/// Suffix the message compiler appends to generated file stems
pub const GENERATED_SUFFIX: &str = "_m";

/// Source of file lists and output locations for a build
pub trait Project: Send + Sync {
    /// Project name
    fn name(&self) -> &str;

    /// Absolute project root
    fn root(&self) -> &Path;

    /// Message definition files, relative to the root
    fn msg_files(&self) -> &[PathBuf];

    /// Hand-written native source files, relative to the root
    fn cpp_files(&self) -> &[PathBuf];

    /// Hand-written header files, relative to the root
    fn header_files(&self) -> &[PathBuf];

    /// Include folders, relative to the root
    fn include_dirs(&self) -> &[PathBuf];

    /// Target names for an artifact kind
    fn targets(&self, kind: ArtifactKind) -> &[String];

    /// Artifact kinds requested for this project
    fn build_kinds(&self) -> &[ArtifactKind];

    /// Root folder of mode-qualified build outputs, relative to the root
    fn out_dir(&self) -> &Path;

    /// Publish folder for executables, relative to the root
    fn bin_dir(&self) -> &Path;

    /// Publish folder for libraries, relative to the root
    fn library_dir(&self) -> &Path;

    /// Executable target names
    fn executables(&self) -> &[String] {
        self.targets(ArtifactKind::Executable)
    }

    /// Map a project-relative path to an absolute one
    fn full_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    /// Map an absolute path back to a project-relative one
    fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(self.root())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Generated `(source, header)` pair for a message file: `A.msg` yields
/// `A_m.cc` and `A_m.h` in the same folder.
pub fn generated_files(msg_file: &Path) -> (PathBuf, PathBuf) {
    let stem = msg_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (
        msg_file.with_file_name(format!("{}{}.{}", stem, GENERATED_SUFFIX, CPP_EXTENSION)),
        msg_file.with_file_name(format!("{}{}.{}", stem, GENERATED_SUFFIX, HEADER_EXTENSION)),
    )
}

/// Project description backed by configuration and a scan of the source folders
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    name: String,
    root: PathBuf,
    msg_files: Vec<PathBuf>,
    cpp_files: Vec<PathBuf>,
    header_files: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
    executables: Vec<String>,
    dynamic_libraries: Vec<String>,
    static_libraries: Vec<String>,
    build_kinds: Vec<ArtifactKind>,
    out_dir: PathBuf,
    bin_dir: PathBuf,
    library_dir: PathBuf,
}

impl ProjectDescriptor {
    /// Create an empty project rooted at `root`
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            msg_files: Vec::new(),
            cpp_files: Vec::new(),
            header_files: Vec::new(),
            include_dirs: Vec::new(),
            executables: Vec::new(),
            dynamic_libraries: Vec::new(),
            static_libraries: Vec::new(),
            build_kinds: Vec::new(),
            out_dir: PathBuf::from("out"),
            bin_dir: PathBuf::from("bin"),
            library_dir: PathBuf::from("lib"),
        }
    }

    /// Build a project from configuration by scanning its source folders
    #[instrument(skip_all, fields(root = %root.display(), name = %config.name))]
    pub fn from_config(root: &Path, config: &ProjectConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(ProjectError::RootNotFound(root.to_path_buf()).into());
        }

        let exclude = config
            .exclude
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| ProjectError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut project = Self::new(config.name.clone(), root);
        project.include_dirs = config.include_dirs.clone();
        project.executables = config.executables.clone();
        project.dynamic_libraries = config.dynamic_libraries.clone();
        project.static_libraries = config.static_libraries.clone();
        project.build_kinds = config.build_kinds.clone();
        project.out_dir = config.out_dir.clone();
        project.bin_dir = config.bin_dir.clone();
        project.library_dir = config.library_dir.clone();

        for source_dir in &config.source_dirs {
            project.scan(source_dir, &exclude)?;
        }

        info!(
            msg_files = project.msg_files.len(),
            cpp_files = project.cpp_files.len(),
            header_files = project.header_files.len(),
            "project scanned"
        );
        Ok(project)
    }

    fn scan(&mut self, source_dir: &Path, exclude: &[glob::Pattern]) -> Result<()> {
        let dir = self.root.join(source_dir);
        if !dir.is_dir() {
            return Err(ProjectError::SourceDirNotFound(dir).into());
        }
        debug!(dir = %dir.display(), "scanning source folder");

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| ProjectError::ScanFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = self.relative_path(entry.path());
            if exclude.iter().any(|p| p.matches_path(&relative)) {
                debug!(path = %relative.display(), "excluded");
                continue;
            }
            if is_generated(&relative) {
                continue;
            }

            match relative.extension().and_then(|e| e.to_str()) {
                Some(MSG_EXTENSION) => self.msg_files.push(relative),
                Some(CPP_EXTENSION) => self.cpp_files.push(relative),
                Some(HEADER_EXTENSION) => self.header_files.push(relative),
                _ => {}
            }
        }

        Ok(())
    }

    /// Set message definition files
    pub fn with_msg_files(mut self, files: Vec<PathBuf>) -> Self {
        self.msg_files = files;
        self
    }

    /// Set native source files
    pub fn with_cpp_files(mut self, files: Vec<PathBuf>) -> Self {
        self.cpp_files = files;
        self
    }

    /// Set header files
    pub fn with_header_files(mut self, files: Vec<PathBuf>) -> Self {
        self.header_files = files;
        self
    }

    /// Set include folders
    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = dirs;
        self
    }

    /// Set the target names for an artifact kind
    pub fn with_targets(mut self, kind: ArtifactKind, names: Vec<String>) -> Self {
        match kind {
            ArtifactKind::Executable => self.executables = names,
            ArtifactKind::DynamicLibrary => self.dynamic_libraries = names,
            ArtifactKind::StaticLibrary => self.static_libraries = names,
        }
        self
    }

    /// Set the requested artifact kinds
    pub fn with_build_kinds(mut self, kinds: Vec<ArtifactKind>) -> Self {
        self.build_kinds = kinds;
        self
    }

    /// Set the output and publish folders
    pub fn with_dirs(
        mut self,
        out_dir: impl Into<PathBuf>,
        bin_dir: impl Into<PathBuf>,
        library_dir: impl Into<PathBuf>,
    ) -> Self {
        self.out_dir = out_dir.into();
        self.bin_dir = bin_dir.into();
        self.library_dir = library_dir.into();
        self
    }
}

/// Whether a file was produced by the message compiler
fn is_generated(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(GENERATED_SUFFIX))
        && path
            .extension()
            .is_some_and(|e| e == CPP_EXTENSION || e == HEADER_EXTENSION)
}

impl Project for ProjectDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn msg_files(&self) -> &[PathBuf] {
        &self.msg_files
    }

    fn cpp_files(&self) -> &[PathBuf] {
        &self.cpp_files
    }

    fn header_files(&self) -> &[PathBuf] {
        &self.header_files
    }

    fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    fn targets(&self, kind: ArtifactKind) -> &[String] {
        match kind {
            ArtifactKind::Executable => &self.executables,
            ArtifactKind::DynamicLibrary => &self.dynamic_libraries,
            ArtifactKind::StaticLibrary => &self.static_libraries,
        }
    }

    fn build_kinds(&self) -> &[ArtifactKind] {
        &self.build_kinds
    }

    fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    fn library_dir(&self) -> &Path {
        &self.library_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_generated_files() {
        let (cc, h) = generated_files(Path::new("src/inet/Packet.msg"));
        assert_eq!(cc, PathBuf::from("src/inet/Packet_m.cc"));
        assert_eq!(h, PathBuf::from("src/inet/Packet_m.h"));
    }

    #[test]
    fn test_generated_files_keep_dotted_stem() {
        let (cc, h) = generated_files(Path::new("src/Foo.v2.msg"));
        assert_eq!(cc, PathBuf::from("src/Foo.v2_m.cc"));
        assert_eq!(h, PathBuf::from("src/Foo.v2_m.h"));
        assert!(is_generated(&cc));
    }

    #[test]
    fn test_is_generated() {
        assert!(is_generated(Path::new("src/A_m.cc")));
        assert!(is_generated(Path::new("src/A_m.h")));
        assert!(!is_generated(Path::new("src/A_m.msg")));
        assert!(!is_generated(Path::new("src/Main.cc")));
    }

    #[test]
    fn test_scan_classifies_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/A.msg");
        write(temp.path(), "src/A_m.cc");
        write(temp.path(), "src/A_m.h");
        write(temp.path(), "src/net/B.cc");
        write(temp.path(), "src/net/B.h");
        write(temp.path(), "src/README.txt");

        let config = ProjectConfig::default();
        let project = ProjectDescriptor::from_config(temp.path(), &config).unwrap();

        assert_eq!(project.msg_files(), [PathBuf::from("src/A.msg")]);
        assert_eq!(project.cpp_files(), [PathBuf::from("src/net/B.cc")]);
        assert_eq!(project.header_files(), [PathBuf::from("src/net/B.h")]);
    }

    #[test]
    fn test_scan_respects_exclude() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/keep.cc");
        write(temp.path(), "src/experimental/drop.cc");

        let config = ProjectConfig {
            exclude: vec!["src/experimental/*".to_string()],
            ..Default::default()
        };
        let project = ProjectDescriptor::from_config(temp.path(), &config).unwrap();

        assert_eq!(project.cpp_files(), [PathBuf::from("src/keep.cc")]);
    }

    #[test]
    fn test_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let config = ProjectConfig::default();
        let err = ProjectDescriptor::from_config(temp.path(), &config).unwrap_err();
        assert!(err.to_string().contains("Source folder not found"));
    }

    #[test]
    fn test_path_mapping() {
        let project = ProjectDescriptor::new("demo", "/work/demo");
        let full = project.full_path(Path::new("src/A.cc"));
        assert_eq!(full, PathBuf::from("/work/demo/src/A.cc"));
        assert_eq!(project.relative_path(&full), PathBuf::from("src/A.cc"));
        assert_eq!(
            project.full_path(Path::new("/elsewhere/x.cc")),
            PathBuf::from("/elsewhere/x.cc")
        );
    }

    #[test]
    fn test_builder_targets() {
        let project = ProjectDescriptor::new("demo", "/work/demo")
            .with_targets(ArtifactKind::Executable, vec!["demo".to_string()])
            .with_build_kinds(vec![ArtifactKind::Executable]);
        assert_eq!(project.executables(), ["demo"]);
        assert!(project.targets(ArtifactKind::StaticLibrary).is_empty());
    }
}
