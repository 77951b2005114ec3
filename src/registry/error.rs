//! Registry error taxonomy.

use std::fmt;

use semver::Version;
use thiserror::Error;

use crate::component::{CatalogError, ComponentId, LifecycleError};
use crate::messaging::RouterError;

/// Why an unload (or swap) was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadBlocker {
    /// Loaded components that list the target (or an owned child) as a dependency.
    Dependents(Vec<ComponentId>),
    /// A member of the subtree has in-flight work or refuses to unload.
    Busy(ComponentId),
}

impl fmt::Display for UnloadBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependents(ids) => {
                let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                write!(f, "still required by {}", ids.join(", "))
            }
            Self::Busy(id) => write!(f, "{} has in-flight work", id),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Component not found: {identifier}{}", format_version(.version))]
    NotFound {
        identifier: ComponentId,
        version: Option<Version>,
    },

    #[error("Circular dependency: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<ComponentId> },

    #[error("Component {component} cannot be unloaded: {blocker}")]
    NotUnloadable {
        component: ComponentId,
        blocker: UnloadBlocker,
    },

    #[error("Component {0} is not hot-swappable")]
    NotSupported(ComponentId),

    #[error("Component {child} is already loaded and cannot be owned by {parent}")]
    OwnershipConflict {
        child: ComponentId,
        parent: ComponentId,
    },

    #[error("Component {0} has no earlier version to roll back to")]
    NoPreviousVersion(ComponentId),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

fn format_version(version: &Option<Version>) -> String {
    version.as_ref().map(|v| format!("@{}", v)).unwrap_or_default()
}

fn format_cycle(cycle: &[ComponentId]) -> String {
    cycle.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(" -> ")
}

impl RegistryError {
    pub(crate) fn not_found(identifier: &ComponentId) -> Self {
        Self::NotFound {
            identifier: identifier.clone(),
            version: None,
        }
    }

    /// Invalid lifecycle transitions surface through this variant.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::Lifecycle(LifecycleError::InvalidState { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_lists_chain() {
        let err = RegistryError::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency: a -> b -> a");
    }

    #[test]
    fn test_not_found_display_includes_version() {
        let err = RegistryError::NotFound {
            identifier: "cpu".into(),
            version: Some(Version::new(2, 0, 0)),
        };
        assert_eq!(err.to_string(), "Component not found: cpu@2.0.0");
        assert_eq!(RegistryError::not_found(&"cpu".into()).to_string(), "Component not found: cpu");
    }
}
