//! Plan execution: stage, compile, package, test.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use super::artifact::BuildArtifact;
use super::compiler::{CompileRequest, Compiler};
use super::error::BuildError;
use super::staging::stage_files;
use super::strategy::BuildStrategy;
use super::test_runner::{TestCase, TestOutcome, TestReport, TestRunner};
use super::version::VersionSequencer;
use crate::component::{ComponentId, ComponentPath};
use crate::scope::BuildPlan;
use crate::telemetry::{self, log_lifecycle_event, LifecycleEvent, OperationSpan, SpanExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Limit for one compile and for each test.
    pub timeout: Duration,
    pub max_concurrent_builds: usize,
    pub source_root: PathBuf,
    pub artifact_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_concurrent_builds: num_cpus::get(),
            source_root: PathBuf::from("."),
            artifact_dir: PathBuf::from("artifacts"),
        }
    }
}

/// Outcome of one executed plan.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// False whenever any test failed.
    pub success: bool,
    pub artifacts: Vec<BuildArtifact>,
    pub build_time: Duration,
    pub version: Version,
    pub messages: Vec<String>,
    pub tests: TestReport,
    pub component: ComponentId,
    pub target_path: ComponentPath,
    pub strategy: BuildStrategy,
}

impl BuildResult {
    /// The artifact to deploy, or `TestsFailed` naming every failing test.
    pub fn ensure_deployable(&self) -> Result<&BuildArtifact, BuildError> {
        if !self.success || !self.tests.all_passed() {
            return Err(BuildError::TestsFailed {
                failed: self.tests.failed.clone(),
            });
        }
        self.artifacts.first().ok_or_else(|| BuildError::BuildFailed {
            reason: format!("build of {} produced no artifact", self.target_path),
        })
    }
}

/// Runs build plans against a compiler and a test runner.
pub struct BuildExecutor {
    compiler: Arc<dyn Compiler>,
    tests: Arc<dyn TestRunner>,
    config: BuildConfig,
    permits: Semaphore,
    sequencer: VersionSequencer,
}

impl BuildExecutor {
    pub fn new(compiler: Arc<dyn Compiler>, tests: Arc<dyn TestRunner>, config: BuildConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_builds.max(1));
        Self {
            compiler,
            tests,
            config,
            permits,
            sequencer: VersionSequencer::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn last_version(&self, target: &ComponentPath) -> Option<Version> {
        self.sequencer.last_issued(&target.to_string())
    }

    /// Execute `plan`.
    ///
    /// Compile and staging failures are errors. Test failures are not: they
    /// come back in a result with `success == false`.
    pub async fn execute(&self, plan: &BuildPlan) -> Result<BuildResult, BuildError> {
        let target = plan.target_path.to_string();
        let span = OperationSpan::new("build", &target);
        let started = Instant::now();
        let result = self.execute_inner(plan, started).instrument(span.clone()).await;
        span.record_result(&result);
        span.record_latency(started);

        let seconds = started.elapsed().as_secs_f64();
        match &result {
            Ok(build) if build.success => telemetry::record_build("success", seconds),
            Ok(build) => {
                telemetry::record_build("tests_failed", seconds);
                let failed = build.tests.failed.join(",");
                log_lifecycle_event(
                    LifecycleEvent::TestsFailed,
                    &target,
                    "tests failed after build",
                    &[("failed", failed.as_str())],
                );
            }
            Err(e) => {
                telemetry::record_build(e.outcome(), seconds);
                log_lifecycle_event(LifecycleEvent::BuildFailed, &target, &e.to_string(), &[]);
            }
        }
        result
    }

    async fn execute_inner(&self, plan: &BuildPlan, started: Instant) -> Result<BuildResult, BuildError> {
        let target = plan.target_path.to_string();
        if plan.is_empty() {
            return Err(BuildError::EmptyPlan(target));
        }
        let strategy = BuildStrategy::for_level(plan.level, &target)?;
        let files = stage_files(&self.config.source_root, &plan.files)?;

        let _permit = self.permits.acquire().await.map_err(|_| BuildError::BuildFailed {
            reason: "build executor is shut down".to_string(),
        })?;

        let version = self.sequencer.next(&target, plan.base_version.as_ref(), plan.action);
        let request = CompileRequest {
            target_path: plan.target_path.clone(),
            level: plan.level,
            action: plan.action,
            strategy,
            version: version.clone(),
            source_root: self.config.source_root.clone(),
            files,
        };

        info!(target = %target, level = %plan.level, strategy = strategy.as_str(), version = %version, "compiling");
        let output = tokio::time::timeout(self.config.timeout, self.compiler.compile(&request))
            .await
            .map_err(|_| BuildError::BuildFailed {
                reason: format!("compile timed out after {}s", self.config.timeout.as_secs()),
            })??;

        let component = plan
            .component
            .clone()
            .unwrap_or_else(|| ComponentId::from(&plan.target_path));
        let artifact = self.package(&component, &plan.target_path, &version, strategy, &output.payload).await?;

        let mut messages = Vec::new();
        if !output.log.trim().is_empty() {
            messages.push(output.log.trim().to_string());
        }
        messages.push(format!(
            "{} {} built as {} ({} bytes)",
            strategy.as_str(),
            target,
            version,
            output.payload.len()
        ));

        let tests = self.run_tests(plan, &version, &artifact).await;
        if !tests.all_passed() {
            warn!(target = %target, failed = ?tests.failed, "tests failed");
        }

        Ok(BuildResult {
            success: tests.all_passed(),
            artifacts: vec![artifact],
            build_time: started.elapsed(),
            version,
            messages,
            tests,
            component,
            target_path: plan.target_path.clone(),
            strategy,
        })
    }

    async fn package(
        &self,
        component: &ComponentId,
        target: &ComponentPath,
        version: &Version,
        strategy: BuildStrategy,
        payload: &[u8],
    ) -> Result<BuildArtifact, BuildError> {
        let extension = if strategy.packages() { "pkg" } else { "bin" };
        let path = self
            .config
            .artifact_dir
            .join(format!("{}-{}.{}", target, version, extension));

        tokio::fs::create_dir_all(&self.config.artifact_dir)
            .await
            .map_err(|e| BuildError::BuildFailed {
                reason: format!("cannot create {}: {}", self.config.artifact_dir.display(), e),
            })?;
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| BuildError::BuildFailed {
                reason: format!("cannot write {}: {}", path.display(), e),
            })?;

        Ok(BuildArtifact::new(component.clone(), version.clone(), path, payload)
            .with_metadata("target_path", target.to_string())
            .with_metadata("strategy", strategy.as_str()))
    }

    async fn run_tests(&self, plan: &BuildPlan, version: &Version, artifact: &BuildArtifact) -> TestReport {
        let timeout = self.config.timeout;
        let runs = plan.tests_to_run.iter().map(|name| {
            let case = TestCase {
                name: name.clone(),
                target_path: plan.target_path.clone(),
                version: version.clone(),
                artifact_path: artifact.path.clone(),
            };
            async move {
                match tokio::time::timeout(timeout, self.tests.run(&case)).await {
                    Ok(outcome) => outcome,
                    Err(_) => TestOutcome::fail(&case.name, "timed out"),
                }
            }
        });
        TestReport::from_outcomes(join_all(runs).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CompileOutput;
    use crate::component::BuildLevel;
    use crate::intent::ChangeAction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoCompiler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Compiler for EchoCompiler {
        async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompileOutput {
                log: String::new(),
                payload: request.target_path.to_string().into_bytes(),
            })
        }
    }

    struct FailNamed(&'static str);

    #[async_trait]
    impl TestRunner for FailNamed {
        async fn run(&self, case: &TestCase) -> TestOutcome {
            if case.name == self.0 {
                TestOutcome::fail(&case.name, "assertion failed")
            } else {
                TestOutcome::pass(&case.name)
            }
        }
    }

    fn plan(path: &str, level: BuildLevel, tests: &[&str]) -> BuildPlan {
        let target = ComponentPath::parse(path).unwrap();
        let mut plan = BuildPlan::empty(target.clone(), ChangeAction::Fix);
        plan.level = level;
        plan.affected_components = vec![target];
        plan.hot_swappable = true;
        plan.tests_to_run = tests.iter().map(|t| t.to_string()).collect();
        plan
    }

    fn executor(dir: &std::path::Path, failing: &'static str) -> (BuildExecutor, Arc<EchoCompiler>) {
        let compiler = Arc::new(EchoCompiler { calls: AtomicUsize::new(0) });
        let config = BuildConfig {
            artifact_dir: dir.join("artifacts"),
            source_root: dir.to_path_buf(),
            ..BuildConfig::default()
        };
        (BuildExecutor::new(compiler.clone(), Arc::new(FailNamed(failing)), config), compiler)
    }

    #[tokio::test]
    async fn test_successful_build_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = executor(dir.path(), "none");
        let result = executor
            .execute(&plan("systemHealth.memory", BuildLevel::Module, &["memory"]))
            .await
            .unwrap();

        assert!(result.success);
        let artifact = result.ensure_deployable().unwrap();
        let bytes = std::fs::read(&artifact.path).unwrap();
        assert!(artifact.verify(&bytes));
        assert_eq!(result.version, Version::new(0, 0, 1));
        assert_eq!(result.strategy, BuildStrategy::WholeModule);
    }

    #[tokio::test]
    async fn test_failed_tests_make_result_non_deployable() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = executor(dir.path(), "memory.display");
        let result = executor
            .execute(&plan("systemHealth.memory", BuildLevel::Module, &["memory", "memory.display"]))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(
            result.ensure_deployable().unwrap_err(),
            BuildError::TestsFailed {
                failed: vec!["memory.display".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_system_level_not_supported_without_compiling() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, compiler) = executor(dir.path(), "none");
        let err = executor
            .execute(&plan("systemHealth", BuildLevel::System, &[]))
            .await
            .unwrap_err();
        assert_eq!(err, BuildError::NotSupported(BuildLevel::System));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_versions_increase_across_builds() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = executor(dir.path(), "none");
        let mut p = plan("systemHealth.cpu", BuildLevel::Module, &[]);
        p.base_version = Some(Version::new(1, 0, 0));
        let first = executor.execute(&p).await.unwrap();
        let second = executor.execute(&p).await.unwrap();
        assert_eq!(first.version, Version::new(1, 0, 1));
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_escaping_file_rejected_before_compile() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, compiler) = executor(dir.path(), "none");
        let mut p = plan("systemHealth.cpu", BuildLevel::Module, &[]);
        p.files = vec!["../secret".into()];
        assert!(matches!(executor.execute(&p).await, Err(BuildError::Staging { .. })));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    }
}
