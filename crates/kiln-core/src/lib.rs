//! kiln Core - Core library for the kiln build orchestrator
//!
//! This crate provides the foundational types, error handling, configuration
//! and the project model (source enumeration, artifact naming) consumed by the
//! task engine.

pub mod artifact;
pub mod config;
pub mod error;
pub mod project;

pub use artifact::{ArtifactKind, BuildMode};
pub use config::{Config, FailurePolicy};
pub use error::{ConfigError, KilnError, ProjectError, Result};
pub use project::{Project, ProjectDescriptor};
