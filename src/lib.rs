//! Swapline runtime
//!
//! Hot-swappable component hierarchy with a natural-language change
//! pipeline: free text is parsed into a change request, scoped into a build
//! plan, built and tested, then swapped into the running registry without
//! disturbing the rest of the tree.
//!
//! # Pipeline
//!
//! - `intent`: keyword matching of text against a component vocabulary
//! - `scope`: affected components, files, tests and an estimate for a target
//! - `build`: compile and test a plan into a versioned artifact
//! - `swap`: deploy the artifact through the registry and announce it
//! - `registry`: the serialized lifecycle manager every step commits to

pub mod build;
pub mod cli;
pub mod component;
pub mod config;
pub mod error;
pub mod intent;
pub mod messaging;
pub mod registry;
pub mod scope;
pub mod swap;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

pub use error::{Error, Result};

use build::{BuildExecutor, BuildResult, Compiler, TestRunner};
use component::{ComponentFactory, ComponentId, JsonCatalog};
use config::Config;
use intent::{ChangeRequest, Intent, IntentParser, Vocabulary};
use registry::{ComponentRegistry, VersionHistory};
use scope::{BuildPlan, ComponentIndex, ScopeAnalyzer};
use swap::{HotSwapCoordinator, SwapOutcome};

/// Pluggable pieces a runtime is assembled from.
pub struct RuntimeParts {
    pub factory: Arc<dyn ComponentFactory>,
    pub compiler: Arc<dyn Compiler>,
    pub tests: Arc<dyn TestRunner>,
    pub vocabulary: Vocabulary,
    /// Scope index. Derived from the vocabulary when `None`.
    pub index: Option<ComponentIndex>,
}

/// Everything one applied change produced.
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub intent: Option<Intent>,
    pub plan: BuildPlan,
    pub build: BuildResult,
    pub swap: SwapOutcome,
}

/// The assembled pipeline.
pub struct Runtime {
    pub registry: Arc<ComponentRegistry>,
    pub parser: IntentParser,
    pub analyzer: ScopeAnalyzer,
    pub executor: BuildExecutor,
    pub coordinator: HotSwapCoordinator,
    history_path: Option<PathBuf>,
}

impl Runtime {
    /// Assemble a runtime. Loads the persisted version history when the
    /// config names one.
    pub fn new(config: &Config, parts: RuntimeParts) -> Result<Self> {
        let history = match &config.history_path {
            Some(path) => VersionHistory::load(path)?,
            None => VersionHistory::new(),
        };
        let index = Arc::new(
            parts
                .index
                .unwrap_or_else(|| ComponentIndex::from_vocabulary(&parts.vocabulary)),
        );
        let parser = IntentParser::new(parts.vocabulary)?;
        let registry = Arc::new(ComponentRegistry::with_history(parts.factory, history));
        let analyzer = ScopeAnalyzer::new(index.clone(), config.durations);
        let executor = BuildExecutor::new(parts.compiler, parts.tests, config.build.clone());
        let mut coordinator = HotSwapCoordinator::new(registry.clone(), index);
        if let Some(path) = &config.history_path {
            coordinator = coordinator.with_history_path(path);
        }

        Ok(Self {
            registry,
            parser,
            analyzer,
            executor,
            coordinator,
            history_path: config.history_path.clone(),
        })
    }

    /// Assemble a runtime from configured files and command capabilities,
    /// then discover the configured catalog.
    pub async fn from_config(config: &Config, factory: Arc<dyn ComponentFactory>) -> Result<Self> {
        let compiler = config.command_compiler().ok_or(Error::MissingCapability("compiler"))?;
        let tests = config
            .command_test_runner()
            .ok_or(Error::MissingCapability("test runner"))?;
        let vocabulary = match &config.vocabulary_path {
            Some(path) => Vocabulary::load(path)?,
            None => Vocabulary::system_health(),
        };
        let index = match &config.index_path {
            Some(path) => Some(ComponentIndex::load(path)?),
            None => None,
        };

        let runtime = Self::new(
            config,
            RuntimeParts {
                factory,
                compiler: Arc::new(compiler),
                tests: Arc::new(tests),
                vocabulary,
                index,
            },
        )?;
        if let Some(path) = &config.catalog_path {
            runtime.registry.discover(&JsonCatalog::new(path)).await?;
        }
        Ok(runtime)
    }

    /// Plan `request` against the running registry.
    pub async fn plan(&self, request: &ChangeRequest) -> BuildPlan {
        let plan = self.analyzer.plan_request(request);
        let component = plan
            .component
            .clone()
            .unwrap_or_else(|| ComponentId::from(&plan.target_path));
        let base = self.registry.version_of(&component).await;
        plan.with_base_version(base)
    }

    /// Parse, plan, build, test and swap a free-text change.
    pub async fn apply_text(&self, text: &str) -> Result<ChangeOutcome> {
        let intent = self.parser.parse(text);
        let request = intent.to_request().ok_or_else(|| Error::ClarificationNeeded {
            text: text.to_string(),
        })?;
        let mut outcome = self.apply(&request).await?;
        outcome.intent = Some(intent);
        Ok(outcome)
    }

    /// Plan, build, test and swap a structured change.
    pub async fn apply(&self, request: &ChangeRequest) -> Result<ChangeOutcome> {
        let plan = self.plan(request).await;
        let build = self.executor.execute(&plan).await?;
        let swap = self.coordinator.swap(&build.component, &build).await?;
        info!(
            target = %plan.target_path,
            action = %request.action,
            version = %build.version,
            "change applied"
        );
        Ok(ChangeOutcome {
            intent: None,
            plan,
            build,
            swap,
        })
    }

    /// Unload everything and persist history. Returns the number of
    /// components released.
    pub async fn shutdown(&self) -> usize {
        let released = self.registry.unload_all().await;
        if let Some(path) = &self.history_path {
            if let Err(e) = self.registry.history_snapshot().await.save(path) {
                warn!(error = %e, "version history not saved at shutdown");
            }
        }
        info!(released, "runtime shut down");
        released
    }
}
