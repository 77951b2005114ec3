//! Component model for the Swapline runtime.
//!
//! Identity, hierarchy, versions, catalog metadata and the lifecycle contract
//! every hot-swappable component implements.

mod behavior;
mod catalog;
mod component;
mod id;
pub(crate) mod instance;
mod level;
mod metadata;
mod status;

pub use behavior::{
    ComponentBehavior, ComponentError, ComponentFactory, ExecutionContext, LoadContext, Payload,
    PresentationHandle,
};
pub(crate) use catalog::validate_entries;
pub use catalog::{CatalogDocument, CatalogError, CatalogProvider, JsonCatalog, StaticCatalog};
pub use component::Component;
pub use id::{ComponentId, ComponentPath, PathError, UNKNOWN_TARGET};
pub use level::{BuildLevel, HierarchyLevel};
pub use metadata::ModuleMetadata;
pub use status::{ComponentStatus, LifecycleError};

pub use semver::Version;
