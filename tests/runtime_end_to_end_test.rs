//! Free text in, swapped component out.

mod common;

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use common::{entry, id, v, EchoCompiler, FakeFactory, Recorder, ScriptedTests};
use swapline::build::TestRunner;
use swapline::component::BuildLevel;
use swapline::config::{CommandSpec, Config};
use swapline::intent::{ChangeAction, ChangeRequest, Vocabulary};
use swapline::messaging::COMPONENT_UPDATED;
use swapline::{Error, Runtime, RuntimeParts};

const BAR_COLOR: &str = "systemHealth.memory.display.bar.color";
const CPU_GRAPH: &str = "systemHealth.cpu.display.graph";

fn config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.build.artifact_dir = dir.join("artifacts");
    config.build.source_root = dir.to_path_buf();
    config.history_path = Some(dir.join("history.json"));
    config
}

async fn runtime(config: &Config, tests: Arc<dyn TestRunner>) -> (Runtime, Arc<Recorder>) {
    let recorder = Recorder::new();
    let runtime = assert_ok!(Runtime::new(
        config,
        RuntimeParts {
            factory: Arc::new(FakeFactory { recorder: recorder.clone() }),
            compiler: Arc::new(EchoCompiler),
            tests,
            vocabulary: Vocabulary::system_health(),
            index: None,
        },
    ));
    for name in [BAR_COLOR, CPU_GRAPH] {
        assert_ok!(runtime.registry.register_metadata(entry(name, &[v(1, 0, 0)], &[], &[])).await);
        assert_ok!(runtime.registry.load(&id(name), None).await);
    }
    recorder.clear();
    (runtime, recorder)
}

#[tokio::test]
async fn test_fix_memory_bar_color_from_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let (runtime, recorder) = runtime(&config, Arc::new(ScriptedTests::default())).await;

    let outcome = assert_ok!(runtime.apply_text("fix the memory bar color").await);

    let intent = outcome.intent.unwrap();
    assert_eq!(intent.target_path(), BAR_COLOR);
    assert_eq!(intent.level, BuildLevel::Property);
    assert_eq!(outcome.plan.base_version, Some(v(1, 0, 0)));
    assert_eq!(outcome.build.version, v(1, 0, 1));
    assert!(outcome.build.success);
    assert_eq!(outcome.swap.component.version, v(1, 0, 1));
    assert_eq!(runtime.registry.version_of(&id(BAR_COLOR)).await, Some(v(1, 0, 1)));
    assert_eq!(
        recorder.events_with("msg:"),
        vec![format!("msg:{}:{}", CPU_GRAPH, COMPONENT_UPDATED)]
    );
    assert!(dir.path().join("history.json").exists());
}

#[tokio::test]
async fn test_vague_text_asks_for_clarification() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let (runtime, recorder) = runtime(&config, Arc::new(ScriptedTests::default())).await;

    let err = assert_err!(runtime.apply_text("make it better somehow").await);
    assert!(matches!(err, Error::ClarificationNeeded { .. }));
    assert!(recorder.events().is_empty());
    assert!(!dir.path().join("artifacts").exists());
}

#[tokio::test]
async fn test_failing_tests_surface_names_and_keep_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let tests = Arc::new(ScriptedTests::failing(&[BAR_COLOR]));
    let (runtime, _) = runtime(&config, tests.clone()).await;

    let err = assert_err!(runtime.apply_text("fix the memory bar color").await);
    assert_eq!(err.failed_tests(), Some(&[BAR_COLOR.to_string()][..]));
    assert_eq!(runtime.registry.version_of(&id(BAR_COLOR)).await, Some(v(1, 0, 0)));

    // The next attempt gets a fresh version rather than reusing the rejected one.
    tests.pass_all();
    let outcome = assert_ok!(runtime.apply_text("fix the memory bar color").await);
    assert_eq!(outcome.build.version, v(1, 0, 2));
}

#[tokio::test]
async fn test_structured_request_skips_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let (runtime, _) = runtime(&config, Arc::new(ScriptedTests::default())).await;

    let request = ChangeRequest::new(CPU_GRAPH.parse().unwrap(), ChangeAction::Enhance);
    let outcome = assert_ok!(runtime.apply(&request).await);
    assert!(outcome.intent.is_none());
    assert_eq!(outcome.swap.component.version, v(1, 1, 0));
    assert_eq!(outcome.plan.level, BuildLevel::Widget);
}

#[tokio::test]
async fn test_shutdown_releases_everything_and_saves_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let (runtime, recorder) = runtime(&config, Arc::new(ScriptedTests::default())).await;

    assert_eq!(runtime.shutdown().await, 2);
    assert_eq!(runtime.registry.loaded_count().await, 0);
    assert_eq!(recorder.events_with("cleanup:").len(), 2);

    // A new runtime picks the saved history back up.
    let (restarted, _) = runtime_with_history(&config).await;
    assert_eq!(restarted.registry.history(&id(CPU_GRAPH)).await.len(), 1);
}

async fn runtime_with_history(config: &Config) -> (Runtime, Arc<Recorder>) {
    let recorder = Recorder::new();
    let runtime = assert_ok!(Runtime::new(
        config,
        RuntimeParts {
            factory: Arc::new(FakeFactory { recorder: recorder.clone() }),
            compiler: Arc::new(EchoCompiler),
            tests: Arc::new(ScriptedTests::default()),
            vocabulary: Vocabulary::system_health(),
            index: None,
        },
    ));
    (runtime, recorder)
}

#[tokio::test]
async fn test_from_config_requires_commands() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    let factory = Arc::new(FakeFactory { recorder: Recorder::new() });

    let err = Runtime::from_config(&config, factory.clone()).await.err().unwrap();
    assert!(matches!(err, Error::MissingCapability("compiler")));

    config.compiler = Some(CommandSpec {
        program: "true".into(),
        args: Vec::new(),
    });
    let err = Runtime::from_config(&config, factory.clone()).await.err().unwrap();
    assert!(matches!(err, Error::MissingCapability("test runner")));

    config.test_runner = Some(CommandSpec {
        program: "true".into(),
        args: Vec::new(),
    });
    let runtime = assert_ok!(Runtime::from_config(&config, factory).await);
    assert_eq!(runtime.registry.loaded_count().await, 0);
}
