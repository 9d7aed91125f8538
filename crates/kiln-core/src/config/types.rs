//! Configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, BuildMode};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project layout and targets
    #[serde(default)]
    pub project: ProjectConfig,

    /// External tools used by the build actions
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Build engine defaults
    #[serde(default)]
    pub build: BuildConfig,
}

/// Project layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (used in task descriptions)
    pub name: String,

    /// Folders scanned for `.msg`, `.cc` and `.h` files, relative to the root
    pub source_dirs: Vec<PathBuf>,

    /// Include folders passed to the compiler
    pub include_dirs: Vec<PathBuf>,

    /// Glob patterns (relative to the root) excluded from scanning
    pub exclude: Vec<String>,

    /// Root folder for mode-qualified build outputs
    pub out_dir: PathBuf,

    /// Publish folder for executables
    pub bin_dir: PathBuf,

    /// Publish folder for libraries
    pub library_dir: PathBuf,

    /// Executable target names
    pub executables: Vec<String>,

    /// Dynamic library target names
    pub dynamic_libraries: Vec<String>,

    /// Static library target names
    pub static_libraries: Vec<String>,

    /// Artifact kinds to build
    pub build_kinds: Vec<ArtifactKind>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "project".to_string(),
            source_dirs: vec![PathBuf::from("src")],
            include_dirs: vec![PathBuf::from("src")],
            exclude: Vec::new(),
            out_dir: PathBuf::from("out"),
            bin_dir: PathBuf::from("bin"),
            library_dir: PathBuf::from("lib"),
            executables: vec!["project".to_string()],
            dynamic_libraries: Vec::new(),
            static_libraries: Vec::new(),
            build_kinds: vec![ArtifactKind::Executable],
        }
    }
}

impl ProjectConfig {
    /// Target names configured for an artifact kind
    pub fn targets(&self, kind: ArtifactKind) -> &[String] {
        match kind {
            ArtifactKind::Executable => &self.executables,
            ArtifactKind::DynamicLibrary => &self.dynamic_libraries,
            ArtifactKind::StaticLibrary => &self.static_libraries,
        }
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain name, used in the output folder (`out/<name>-<mode>`)
    pub name: String,

    /// Message compiler command
    pub msgc: String,

    /// Extra message compiler arguments
    pub msgc_flags: Vec<String>,

    /// C++ compiler (also used as the linker driver)
    pub cxx: String,

    /// Compiler flags for every mode
    pub cxxflags: Vec<String>,

    /// Linker flags
    pub ldflags: Vec<String>,

    /// Archiver for static libraries
    pub ar: String,

    /// Extra compiler flags in debug mode
    pub debug_flags: Vec<String>,

    /// Extra compiler flags in release mode
    pub release_flags: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            name: "clang".to_string(),
            msgc: "opp_msgc".to_string(),
            msgc_flags: Vec::new(),
            cxx: "clang++".to_string(),
            cxxflags: vec!["-std=c++17".to_string(), "-fPIC".to_string()],
            ldflags: Vec::new(),
            ar: "ar".to_string(),
            debug_flags: vec!["-O0".to_string(), "-g".to_string()],
            release_flags: vec!["-O3".to_string(), "-DNDEBUG".to_string()],
        }
    }
}

impl ToolchainConfig {
    /// Mode-specific compiler flags
    pub fn mode_flags(&self, mode: BuildMode) -> &[String] {
        match mode {
            BuildMode::Debug => &self.debug_flags,
            BuildMode::Release => &self.release_flags,
        }
    }
}

/// What the pipeline does after a stage reports a failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop before the next stage; later stages are reported as skipped
    #[default]
    Halt,
    /// Let later stages attempt execution and report every failure
    Continue,
}

/// Build engine defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default build mode
    pub mode: BuildMode,

    /// Whether units inside a stage may run concurrently
    pub concurrent: bool,

    /// Maximum concurrent units (defaults to available parallelism)
    pub jobs: Option<usize>,

    /// Behavior after a failed stage
    pub failure_policy: FailurePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::Release,
            concurrent: true,
            jobs: None,
            failure_policy: FailurePolicy::Halt,
        }
    }
}
