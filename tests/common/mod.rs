//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use semver::Version;
use serde_json::json;

use swapline::build::{
    BuildConfig, BuildError, BuildExecutor, CompileOutput, CompileRequest, Compiler, TestCase,
    TestOutcome, TestRunner,
};
use swapline::component::{
    ComponentBehavior, ComponentError, ComponentFactory, ComponentId, ExecutionContext, LoadContext,
    ModuleMetadata, Payload,
};
use swapline::messaging::{ComponentMessage, MessageType};
use swapline::registry::ComponentRegistry;

/// Records lifecycle calls and holds the knobs fake components consult.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
    fail_init: Mutex<HashSet<String>>,
    fail_messages: Mutex<HashSet<String>>,
    busy: Mutex<HashSet<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: String) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events().into_iter().filter(|e| e.starts_with(prefix)).collect()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Fail initialization of `id` at any version, or only `id@version`.
    pub fn fail_init(&self, key: &str) {
        self.fail_init.lock().insert(key.to_string());
    }

    pub fn fail_messages(&self, id: &str) {
        self.fail_messages.lock().insert(id.to_string());
    }

    pub fn set_busy(&self, id: &str, busy: bool) {
        let mut set = self.busy.lock();
        if busy {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    fn init_fails(&self, id: &str, version: &Version) -> bool {
        let set = self.fail_init.lock();
        set.contains(id) || set.contains(&format!("{}@{}", id, version))
    }
}

/// Component whose hooks report to a [`Recorder`].
///
/// `execute` with a `block` key waits for a suspend request.
pub struct FakeComponent {
    id: ComponentId,
    version: Version,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl ComponentBehavior for FakeComponent {
    async fn initialize(&self) -> Result<(), ComponentError> {
        self.recorder.record(format!("init:{}@{}", self.id, self.version));
        if self.recorder.init_fails(self.id.as_str(), &self.version) {
            return Err(ComponentError::Initialization("recorder says no".into()));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Payload) -> Result<Payload, ComponentError> {
        if input.contains_key("block") {
            ctx.suspend_requested().await;
            return Err(ComponentError::Cancelled);
        }
        let mut out = Payload::new();
        out.insert("component".into(), json!(self.id.as_str()));
        out.insert("version".into(), json!(self.version.to_string()));
        Ok(out)
    }

    async fn handle_message(&self, message: &ComponentMessage) -> Result<Option<Payload>, ComponentError> {
        let label = match message.event_name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", message.kind).to_lowercase(),
        };
        self.recorder.record(format!("msg:{}:{}", self.id, label));
        if self.recorder.fail_messages.lock().contains(self.id.as_str()) {
            return Err(ComponentError::Message("handler crashed".into()));
        }
        if message.kind == MessageType::Query {
            let mut reply = Payload::new();
            reply.insert("version".into(), json!(self.version.to_string()));
            return Ok(Some(reply));
        }
        Ok(None)
    }

    async fn cleanup(&self) -> Result<(), ComponentError> {
        self.recorder.record(format!("cleanup:{}@{}", self.id, self.version));
        Ok(())
    }

    fn can_unload(&self) -> bool {
        !self.recorder.busy.lock().contains(self.id.as_str())
    }
}

pub struct FakeFactory {
    pub recorder: Arc<Recorder>,
}

impl ComponentFactory for FakeFactory {
    fn create(&self, ctx: &LoadContext<'_>) -> Result<Arc<dyn ComponentBehavior>, ComponentError> {
        Ok(Arc::new(FakeComponent {
            id: ctx.metadata.identifier.clone(),
            version: ctx.version.clone(),
            recorder: self.recorder.clone(),
        }))
    }
}

pub fn v(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

pub fn id(s: &str) -> ComponentId {
    ComponentId::new(s)
}

pub fn entry(identifier: &str, versions: &[Version], deps: &[&str], children: &[&str]) -> ModuleMetadata {
    ModuleMetadata::new(identifier, identifier, versions.to_vec())
        .with_dependencies(deps.iter().copied())
        .with_children(children.iter().copied())
}

/// Registry backed by a recording factory, with `entries` registered.
pub async fn registry_with(entries: Vec<ModuleMetadata>) -> (Arc<ComponentRegistry>, Arc<Recorder>) {
    let recorder = Recorder::new();
    let registry = Arc::new(ComponentRegistry::new(Arc::new(FakeFactory { recorder: recorder.clone() })));
    for e in entries {
        registry.register_metadata(e).await.unwrap();
    }
    (registry, recorder)
}

/// Compiler that emits `target@version` as the payload.
pub struct EchoCompiler;

#[async_trait]
impl Compiler for EchoCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, BuildError> {
        Ok(CompileOutput {
            log: format!("compiled {} file(s)", request.files.len()),
            payload: format!("{}@{}", request.target_path, request.version).into_bytes(),
        })
    }
}

/// Compiler that always rejects the sources.
pub struct BrokenCompiler;

#[async_trait]
impl Compiler for BrokenCompiler {
    async fn compile(&self, _request: &CompileRequest) -> Result<CompileOutput, BuildError> {
        Err(BuildError::CompilationFailed {
            output: "error[E0308]: mismatched types".into(),
        })
    }
}

/// Passes every test except the ones named at construction.
#[derive(Default)]
pub struct ScriptedTests {
    failing: Mutex<HashSet<String>>,
}

impl ScriptedTests {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
        }
    }

    pub fn pass_all(&self) {
        self.failing.lock().clear();
    }
}

#[async_trait]
impl TestRunner for ScriptedTests {
    async fn run(&self, case: &TestCase) -> TestOutcome {
        if self.failing.lock().contains(&case.name) {
            TestOutcome::fail(&case.name, "assertion failed")
        } else {
            TestOutcome::pass(&case.name)
        }
    }
}

/// Executor writing artifacts under `dir` with the echo compiler.
pub fn executor_in(dir: &std::path::Path, tests: Arc<dyn TestRunner>) -> BuildExecutor {
    let config = BuildConfig {
        artifact_dir: dir.join("artifacts"),
        source_root: dir.to_path_buf(),
        ..BuildConfig::default()
    };
    BuildExecutor::new(Arc::new(EchoCompiler), tests, config)
}
