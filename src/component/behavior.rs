//! The lifecycle contract implemented by every component.
//!
//! Hosts supply implementations through a [`ComponentFactory`]. The registry
//! owns the state machine around the behavior; behaviors only see the hooks.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::id::ComponentId;
use super::metadata::ModuleMetadata;
use crate::build::BuildArtifact;
use crate::messaging::ComponentMessage;

/// Key/value body of executions and messages. Keys are unique.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Opaque handle the host renders. Never inspected by the runtime.
pub type PresentationHandle = Arc<dyn Any + Send + Sync>;

/// Failures reported by component hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("execution cancelled by suspend request")]
    Cancelled,

    #[error("message handling failed: {0}")]
    Message(String),

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    #[error("no implementation available: {0}")]
    Unavailable(String),
}

/// Per-execution context carrying the cooperative suspension signal.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    component: ComponentId,
    suspend: CancellationToken,
}

impl ExecutionContext {
    pub(crate) fn new(component: ComponentId, suspend: CancellationToken) -> Self {
        Self { component, suspend }
    }

    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// Long-running executions should poll this and wind down.
    pub fn is_suspend_requested(&self) -> bool {
        self.suspend.is_cancelled()
    }

    /// Resolves once a suspend has been requested.
    pub async fn suspend_requested(&self) {
        self.suspend.cancelled().await
    }
}

/// Lifecycle and messaging hooks of a component.
///
/// Only `initialize` is required. Behavior differences between components
/// are expressed through declared capabilities, not through this trait.
#[async_trait]
pub trait ComponentBehavior: Send + Sync {
    async fn initialize(&self) -> Result<(), ComponentError>;

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        _input: Payload,
    ) -> Result<Payload, ComponentError> {
        Ok(Payload::new())
    }

    /// Handle a delivered message; `Some` payload becomes the response.
    async fn handle_message(
        &self,
        _message: &ComponentMessage,
    ) -> Result<Option<Payload>, ComponentError> {
        Ok(None)
    }

    /// Release resources. Errors are logged and otherwise ignored.
    async fn cleanup(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn on_suspend(&self) {}

    async fn on_resume(&self) {}

    /// `false` while the component holds work that must not be interrupted.
    fn can_unload(&self) -> bool {
        true
    }

    fn can_suspend(&self) -> bool {
        true
    }

    fn presentation(&self) -> Option<PresentationHandle> {
        None
    }
}

/// What a factory sees when asked for a component instance.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub metadata: &'a ModuleMetadata,
    pub version: &'a Version,
    /// Built artifact for this version, if it came out of the build executor.
    pub artifact: Option<&'a BuildArtifact>,
}

/// Produces behaviors for catalog entries.
pub trait ComponentFactory: Send + Sync {
    fn create(&self, ctx: &LoadContext<'_>) -> Result<Arc<dyn ComponentBehavior>, ComponentError>;
}
