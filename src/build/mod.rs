//! Build executor: turns a build plan into a tested artifact.

mod artifact;
mod compiler;
mod error;
mod executor;
mod staging;
mod strategy;
mod test_runner;
mod version;

pub use artifact::{checksum_hex, BuildArtifact};
pub use compiler::{CommandCompiler, CompileOutput, CompileRequest, Compiler};
pub use error::BuildError;
pub use executor::{BuildConfig, BuildExecutor, BuildResult};
pub use staging::stage_files;
pub use strategy::BuildStrategy;
pub use test_runner::{CommandTestRunner, TestCase, TestOutcome, TestReport, TestRunner};
pub use version::{bump_version, VersionSequencer};
