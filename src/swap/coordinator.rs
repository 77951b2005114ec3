//! Deploys build results by hot-swapping them into the registry.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashSet;
use semver::Version;
use tracing::{info, warn, Instrument};

use super::error::SwapError;
use crate::build::{BuildArtifact, BuildResult};
use crate::component::{Component, ComponentId};
use crate::messaging::{BroadcastReport, ComponentMessage, COMPONENT_UPDATED};
use crate::registry::ComponentRegistry;
use crate::scope::ComponentIndex;
use crate::telemetry::{log_lifecycle_event, LifecycleEvent, OperationSpan, SpanExt};

/// Result of a completed deployment.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub component: Component,
    /// Version that was running before, `None` for a first deployment.
    pub previous: Option<Version>,
    pub artifact: Option<BuildArtifact>,
    /// Delivery of the `component-updated` broadcast.
    pub report: BroadcastReport,
}

/// Marks a component as mid-swap for as long as it lives.
struct InFlight<'a> {
    set: &'a DashSet<ComponentId>,
    id: ComponentId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<ComponentId>, id: &ComponentId) -> Result<Self, SwapError> {
        if !set.insert(id.clone()) {
            return Err(SwapError::InProgress(id.clone()));
        }
        Ok(Self { set, id: id.clone() })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Takes tested builds to running components.
pub struct HotSwapCoordinator {
    registry: Arc<ComponentRegistry>,
    index: Arc<ComponentIndex>,
    in_progress: DashSet<ComponentId>,
    history_path: Option<PathBuf>,
}

impl HotSwapCoordinator {
    pub fn new(registry: Arc<ComponentRegistry>, index: Arc<ComponentIndex>) -> Self {
        Self {
            registry,
            index,
            in_progress: DashSet::new(),
            history_path: None,
        }
    }

    /// Persist the registry's version history to `path` after every change.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn is_swapping(&self, id: &ComponentId) -> bool {
        self.in_progress.contains(id)
    }

    /// Deploy `build` as the running version of `id`.
    ///
    /// A loaded component is swapped through `update_module`; one that is
    /// not loaded yet is loaded at the built version. Every other loaded
    /// component then receives a `component-updated` event.
    pub async fn swap(&self, id: &ComponentId, build: &BuildResult) -> Result<SwapOutcome, SwapError> {
        let span = OperationSpan::new("swap", id.as_str());
        let result = self.swap_inner(id, build).instrument(span.clone()).await;
        span.record_result(&result);
        if let Err(e) = &result {
            if matches!(e, SwapError::Build(_) | SwapError::NotSupported(_)) {
                log_lifecycle_event(LifecycleEvent::SwapRejected, id.as_str(), &e.to_string(), &[]);
            }
        }
        result
    }

    async fn swap_inner(&self, id: &ComponentId, build: &BuildResult) -> Result<SwapOutcome, SwapError> {
        let artifact = build.ensure_deployable()?.clone();

        match self.index.is_hot_swappable(&build.target_path) {
            Some(false) => return Err(SwapError::NotSupported(build.target_path.clone())),
            Some(true) => {}
            None => {
                if let Some(component) = self.registry.get(id).await {
                    if !component.hot_swappable {
                        return Err(SwapError::NotSupported(build.target_path.clone()));
                    }
                }
            }
        }

        let _guard = InFlight::acquire(&self.in_progress, id)?;
        let previous = self.registry.version_of(id).await;
        let version = artifact.version.clone();
        let offered = self
            .registry
            .catalog_entry(id)
            .await
            .is_some_and(|entry| entry.has_version(&version));
        self.registry.publish_artifact(id, artifact.clone()).await?;

        let swapped = match &previous {
            Some(_) => self.registry.update_module(id, version.clone()).await,
            None => self.registry.load(id, Some(version.clone())).await,
        };
        let component = match swapped {
            Ok(component) => component,
            Err(e) => {
                // A version that failed to go live must not become the default.
                if !offered {
                    self.registry.withdraw_artifact(id, &version).await;
                }
                return Err(e.into());
            }
        };
        info!(
            component = %id,
            from = %previous.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
            to = %version,
            checksum = %artifact.checksum,
            "deployment complete"
        );

        let report = self.announce(id, &version, previous.as_ref()).await;
        self.persist_history().await?;
        Ok(SwapOutcome {
            component,
            previous,
            artifact: Some(artifact),
            report,
        })
    }

    /// Swap `id` back to the version that ran before the current one.
    pub async fn rollback(&self, id: &ComponentId) -> Result<SwapOutcome, SwapError> {
        let span = OperationSpan::new("rollback", id.as_str());
        let result = self.rollback_inner(id).instrument(span.clone()).await;
        span.record_result(&result);
        result
    }

    async fn rollback_inner(&self, id: &ComponentId) -> Result<SwapOutcome, SwapError> {
        let _guard = InFlight::acquire(&self.in_progress, id)?;
        let previous = self.registry.version_of(id).await;
        let component = self.registry.rollback(id).await?;
        let artifact = self.registry.artifact(id, &component.version).await;
        let report = self.announce(id, &component.version, previous.as_ref()).await;
        self.persist_history().await?;
        Ok(SwapOutcome {
            component,
            previous,
            artifact,
            report,
        })
    }

    async fn announce(&self, id: &ComponentId, version: &Version, previous: Option<&Version>) -> BroadcastReport {
        let mut message = ComponentMessage::event(id.clone(), COMPONENT_UPDATED)
            .with_payload("component", id.as_str())
            .with_payload("version", version.to_string());
        if let Some(previous) = previous {
            message = message.with_payload("previous", previous.to_string());
        }
        let report = self.registry.broadcast(&message).await;
        if !report.failed.is_empty() {
            warn!(component = %id, failed = report.failed.len(), "update notice not delivered everywhere");
        }
        report
    }

    async fn persist_history(&self) -> Result<(), SwapError> {
        if let Some(path) = &self.history_path {
            self.registry.history_snapshot().await.save(path)?;
        }
        Ok(())
    }
}
