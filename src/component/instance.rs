//! Runtime wrapper enforcing the lifecycle state machine around a behavior.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::behavior::{ComponentBehavior, ComponentError, ExecutionContext, Payload, PresentationHandle};
use super::id::ComponentId;
use super::status::{ComponentStatus, LifecycleError};
use crate::messaging::{ComponentMessage, MessageSink};

/// One loaded (or staged) instance of a component version.
pub(crate) struct ComponentInstance {
    id: ComponentId,
    version: Version,
    behavior: Arc<dyn ComponentBehavior>,
    status: RwLock<ComponentStatus>,
    in_flight: AtomicU32,
    suspend: Mutex<CancellationToken>,
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("status", &self.status())
            .finish()
    }
}

/// Decrements the optimistic in-flight counter on drop.
struct InFlight<'a>(&'a AtomicU32);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ComponentInstance {
    pub fn new(id: ComponentId, version: Version, behavior: Arc<dyn ComponentBehavior>) -> Self {
        Self {
            id,
            version,
            behavior,
            status: RwLock::new(ComponentStatus::Uninitialized),
            in_flight: AtomicU32::new(0),
            suspend: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn status(&self) -> ComponentStatus {
        *self.status.read()
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn presentation(&self) -> Option<PresentationHandle> {
        self.behavior.presentation()
    }

    /// Move `expected -> next` atomically, or report the actual state.
    fn transition(
        &self,
        operation: &'static str,
        allowed: &[ComponentStatus],
        next: ComponentStatus,
    ) -> Result<(), LifecycleError> {
        let mut status = self.status.write();
        if !allowed.contains(&status) || !status.can_transition(next) {
            return Err(LifecycleError::InvalidState {
                component: self.id.clone(),
                operation,
                state: *status,
            });
        }
        *status = next;
        Ok(())
    }

    fn set_status(&self, next: ComponentStatus) {
        *self.status.write() = next;
    }

    pub async fn initialize(&self) -> Result<(), LifecycleError> {
        self.transition(
            "initialize",
            &[ComponentStatus::Uninitialized],
            ComponentStatus::Initializing,
        )?;

        match self.behavior.initialize().await {
            Ok(()) => {
                self.set_status(ComponentStatus::Ready);
                debug!(component = %self.id, version = %self.version, "component initialized");
                Ok(())
            }
            Err(source) => {
                self.set_status(ComponentStatus::Error);
                Err(LifecycleError::InitializationFailed {
                    component: self.id.clone(),
                    source,
                })
            }
        }
    }

    pub async fn execute(&self, input: Payload) -> Result<Payload, LifecycleError> {
        self.transition("execute", &[ComponentStatus::Ready], ComponentStatus::Executing)?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let ctx = ExecutionContext::new(self.id.clone(), self.suspend.lock().clone());
        let result = self.behavior.execute(&ctx, input).await;

        let mut status = self.status.write();
        match result {
            Ok(output) => {
                // Teardown may have started while executing.
                if *status == ComponentStatus::Executing {
                    *status = ComponentStatus::Ready;
                }
                Ok(output)
            }
            Err(source) => {
                if *status == ComponentStatus::Executing {
                    *status = ComponentStatus::Error;
                }
                Err(LifecycleError::ExecutionFailed {
                    component: self.id.clone(),
                    source,
                })
            }
        }
    }

    /// Signal running executions to wind down.
    pub fn request_suspend(&self) {
        self.suspend.lock().cancel();
    }

    /// Move `Ready -> Suspended` under the status lock. An execution that
    /// started after any earlier check makes this fail instead of being
    /// overwritten.
    pub fn begin_suspend(&self) -> Result<(), LifecycleError> {
        if !self.behavior.can_suspend() {
            return Err(LifecycleError::Refused {
                component: self.id.clone(),
                operation: "suspend",
            });
        }
        self.transition("suspend", &[ComponentStatus::Ready], ComponentStatus::Suspended)
    }

    /// Undo `begin_suspend` when a sibling could not be suspended.
    pub fn revert_suspend(&self) {
        let mut status = self.status.write();
        if *status == ComponentStatus::Suspended {
            *status = ComponentStatus::Ready;
        }
    }

    pub async fn finish_suspend(&self) {
        self.behavior.on_suspend().await;
    }

    /// Move `Suspended -> Ready` and arm a fresh suspension token.
    pub fn begin_resume(&self) -> Result<(), LifecycleError> {
        self.transition("resume", &[ComponentStatus::Suspended], ComponentStatus::Ready)?;
        *self.suspend.lock() = CancellationToken::new();
        Ok(())
    }

    /// Undo `begin_resume`. Only a member still idle in `Ready` goes back.
    pub fn revert_resume(&self) {
        let mut status = self.status.write();
        if *status == ComponentStatus::Ready {
            *status = ComponentStatus::Suspended;
        }
    }

    pub async fn finish_resume(&self) {
        self.behavior.on_resume().await;
    }

    /// Whether the instance may be retired right now.
    pub fn can_unload(&self) -> bool {
        self.in_flight() == 0
            && self.status() != ComponentStatus::Executing
            && self.behavior.can_unload()
    }

    /// Best-effort release. Never fails and is idempotent.
    pub async fn cleanup(&self) {
        {
            let mut status = self.status.write();
            if matches!(*status, ComponentStatus::Uninitialized | ComponentStatus::Cleaning) {
                return;
            }
            *status = ComponentStatus::Cleaning;
        }
        self.suspend.lock().cancel();

        if let Err(e) = self.behavior.cleanup().await {
            warn!(component = %self.id, error = %e, "cleanup hook failed; continuing teardown");
        }
        self.set_status(ComponentStatus::Uninitialized);
        debug!(component = %self.id, version = %self.version, "component cleaned up");
    }
}

#[async_trait]
impl MessageSink for ComponentInstance {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn status(&self) -> ComponentStatus {
        ComponentInstance::status(self)
    }

    async fn deliver(&self, message: &ComponentMessage) -> Result<Option<Payload>, ComponentError> {
        self.behavior.handle_message(message).await
    }
}
