//! Build failure taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::component::BuildLevel;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Compilation failed:\n{output}")]
    CompilationFailed { output: String },

    #[error("Build failed: {reason}")]
    BuildFailed { reason: String },

    #[error("Tests failed: {}", .failed.join(", "))]
    TestsFailed { failed: Vec<String> },

    #[error("Builds at the {0} level are not supported")]
    NotSupported(BuildLevel),

    #[error("Nothing to build for {0}: target is not indexed")]
    EmptyPlan(String),

    #[error("Cannot stage {}: {reason}", .path.display())]
    Staging { path: PathBuf, reason: String },
}

impl BuildError {
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Self::CompilationFailed { .. } => "compile_failed",
            Self::TestsFailed { .. } => "tests_failed",
            Self::NotSupported(_) | Self::EmptyPlan(_) => "rejected",
            Self::BuildFailed { .. } | Self::Staging { .. } => "build_failed",
        }
    }
}
