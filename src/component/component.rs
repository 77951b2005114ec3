//! Point-in-time view of a loaded component.

use std::collections::BTreeSet;

use semver::Version;
use serde::Serialize;

use super::id::{ComponentId, ComponentPath};
use super::level::HierarchyLevel;
use super::status::ComponentStatus;

/// Snapshot returned by registry queries. Mutating it has no effect on the
/// loaded instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub id: ComponentId,
    pub path: ComponentPath,
    pub hierarchy_level: HierarchyLevel,
    pub version: Version,
    pub dependencies: BTreeSet<ComponentId>,
    pub capabilities: BTreeSet<String>,
    pub children: Vec<ComponentId>,
    pub parent: Option<ComponentId>,
    pub status: ComponentStatus,
    pub hot_swappable: bool,
}

impl Component {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn depends_on(&self, other: &ComponentId) -> bool {
        self.dependencies.contains(other)
    }
}
