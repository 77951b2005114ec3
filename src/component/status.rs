//! Component lifecycle states and lifecycle errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::behavior::ComponentError;
use super::id::ComponentId;

/// Lifecycle state of a loaded component.
///
/// ```text
/// uninitialized -> initializing -> ready <-> executing
///                                  ready <-> suspended
/// any -> error
/// ready | suspended | error -> cleaning -> uninitialized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Uninitialized,
    Initializing,
    Ready,
    Executing,
    Suspended,
    Error,
    Cleaning,
}

impl ComponentStatus {
    /// Whether the machine permits `self -> next`.
    ///
    /// `Cleaning` is reachable from every state except `Uninitialized`,
    /// so teardown can always make progress.
    pub fn can_transition(&self, next: ComponentStatus) -> bool {
        use ComponentStatus::*;
        match (self, next) {
            (Uninitialized, Initializing) => true,
            (Initializing, Ready) => true,
            (Ready, Executing) | (Executing, Ready) => true,
            (Ready, Suspended) | (Suspended, Ready) => true,
            (Cleaning, Uninitialized) => true,
            (Cleaning, _) => false,
            (Uninitialized, _) => false,
            (_, Error) => true,
            (_, Cleaning) => true,
            _ => false,
        }
    }

    /// States in which the component may receive messages.
    pub fn accepts_messages(&self) -> bool {
        matches!(self, Self::Ready | Self::Executing | Self::Suspended | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Suspended => "suspended",
            Self::Error => "error",
            Self::Cleaning => "cleaning",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle methods.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid state for {operation} on {component}: {state}")]
    InvalidState {
        component: ComponentId,
        operation: &'static str,
        state: ComponentStatus,
    },

    #[error("Initialization of {component} failed: {source}")]
    InitializationFailed {
        component: ComponentId,
        #[source]
        source: ComponentError,
    },

    #[error("Execution of {component} failed: {source}")]
    ExecutionFailed {
        component: ComponentId,
        #[source]
        source: ComponentError,
    },

    #[error("Component {component} refused to {operation}")]
    Refused {
        component: ComponentId,
        operation: &'static str,
    },
}

impl LifecycleError {
    pub fn component(&self) -> &ComponentId {
        match self {
            Self::InvalidState { component, .. }
            | Self::InitializationFailed { component, .. }
            | Self::ExecutionFailed { component, .. }
            | Self::Refused { component, .. } => component,
        }
    }
}
