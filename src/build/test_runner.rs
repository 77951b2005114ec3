//! The test capability.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::component::ComponentPath;

/// One test to run against a freshly built artifact.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub target_path: ComponentPath,
    pub version: Version,
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub output: String,
}

impl TestOutcome {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            output: String::new(),
        }
    }

    pub fn fail(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            output: output.into(),
        }
    }
}

/// Names of passing and failing tests, in the order they were planned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
}

impl TestReport {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            if outcome.passed {
                report.passed.push(outcome.name);
            } else {
                report.failed.push(outcome.name);
            }
        }
        report
    }

    pub fn all_passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Runs a single named test. Never errors: a test that cannot run fails.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, case: &TestCase) -> TestOutcome;
}

/// Test runner that runs an external program once per test.
///
/// The program receives `args` followed by the test name, with the
/// artifact location in `SWAPLINE_ARTIFACT`. Exit status zero passes.
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    program: String,
    args: Vec<String>,
}

impl CommandTestRunner {
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
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run(&self, case: &TestCase) -> TestOutcome {
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(&case.name)
            .env("SWAPLINE_TEST", &case.name)
            .env("SWAPLINE_TARGET", case.target_path.to_string())
            .env("SWAPLINE_VERSION", case.version.to_string())
            .env("SWAPLINE_ARTIFACT", &case.artifact_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => TestOutcome::pass(&case.name),
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                TestOutcome::fail(&case.name, text)
            }
            Err(e) => TestOutcome::fail(&case.name, format!("cannot launch `{}`: {}", self.program, e)),
        }
    }
}
