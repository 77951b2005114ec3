//! The compile capability.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use semver::Version;
use tokio::process::Command;
use tracing::debug;

use super::error::BuildError;
use super::strategy::BuildStrategy;
use crate::component::{BuildLevel, ComponentPath};
use crate::intent::ChangeAction;

/// One compile invocation.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub target_path: ComponentPath,
    pub level: BuildLevel,
    pub action: ChangeAction,
    pub strategy: BuildStrategy,
    pub version: Version,
    pub source_root: PathBuf,
    /// Staged files, already resolved under `source_root`.
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Human-readable compiler log.
    pub log: String,
    /// Artifact bytes.
    pub payload: Vec<u8>,
}

/// Turns staged sources into artifact bytes.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, BuildError>;
}

/// Compiler that runs an external program.
///
/// The program receives `args` followed by the staged files, runs in the
/// source root, and sees the request through `SWAPLINE_*` variables. Its
/// stdout becomes the artifact payload and its stderr the log.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, BuildError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(&request.files)
            .current_dir(&request.source_root)
            .env("SWAPLINE_TARGET", request.target_path.to_string())
            .env("SWAPLINE_LEVEL", request.level.as_str())
            .env("SWAPLINE_ACTION", request.action.as_str())
            .env("SWAPLINE_STRATEGY", request.strategy.as_str())
            .env("SWAPLINE_VERSION", request.version.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(program = %self.program, target = %request.target_path, files = request.files.len(), "spawning compiler");
        let output = cmd.output().await.map_err(|e| BuildError::BuildFailed {
            reason: format!("cannot launch compiler `{}`: {}", self.program, e),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(BuildError::CompilationFailed {
                output: format!("exit {}\n{}{}", code, stdout, stderr),
            });
        }

        Ok(CompileOutput {
            log: stderr,
            payload: output.stdout,
        })
    }
}
