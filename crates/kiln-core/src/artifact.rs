//! Build modes and artifact naming
//!
//! The naming convention only decides file paths. Nothing in the task engine
//! branches on an artifact kind except to pick a name and a link command.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Build mode of the output binaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Unoptimized build with debug info
    Debug,
    /// Optimized build
    #[default]
    Release,
}

impl BuildMode {
    /// Get the mode name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    /// Suffix appended to artifact names built in this mode
    pub fn artifact_suffix(&self) -> &'static str {
        match self {
            Self::Debug => "_dbg",
            Self::Release => "",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(format!("unknown build mode: {}", other)),
        }
    }
}

/// Kind of linked artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Executable binary
    Executable,
    /// Shared object (.so)
    DynamicLibrary,
    /// Static archive (.a)
    StaticLibrary,
}

impl ArtifactKind {
    /// All artifact kinds, in pipeline order
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Executable,
        ArtifactKind::DynamicLibrary,
        ArtifactKind::StaticLibrary,
    ];

    /// Get the kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::DynamicLibrary => "dynamic-library",
            Self::StaticLibrary => "static-library",
        }
    }

    /// Plural label used in task descriptions
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Executable => "executables",
            Self::DynamicLibrary => "dynamic libraries",
            Self::StaticLibrary => "static libraries",
        }
    }

    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Executable => "",
            Self::DynamicLibrary | Self::StaticLibrary => "lib",
        }
    }

    /// File name extension, including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Executable => "",
            Self::DynamicLibrary => ".so",
            Self::StaticLibrary => ".a",
        }
    }

    /// Whether artifacts of this kind are published to the library folder
    pub fn is_library(&self) -> bool {
        !matches!(self, Self::Executable)
    }

    /// Compute the artifact file name for a target in the given mode.
    ///
    /// `file_name(Executable, "INET", Debug)` is `INET_dbg`,
    /// `file_name(DynamicLibrary, "INET", Release)` is `libINET.so`.
    pub fn file_name(&self, name: &str, mode: BuildMode) -> String {
        format!(
            "{}{}{}{}",
            self.prefix(),
            name,
            mode.artifact_suffix(),
            self.extension()
        )
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "executable" | "exe" => Ok(Self::Executable),
            "dynamic-library" | "shared" | "so" => Ok(Self::DynamicLibrary),
            "static-library" | "static" | "a" => Ok(Self::StaticLibrary),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}
