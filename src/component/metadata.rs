//! Discovery-time catalog entries.

use semver::Version;
use serde::{Deserialize, Serialize};

use super::catalog::CatalogError;
use super::id::{ComponentId, ComponentPath};
use super::level::HierarchyLevel;

/// Catalog record for a component, independent of any loaded instance.
///
/// Entries are immutable once discovered. Re-discovery and artifact
/// publication replace an entry wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub identifier: ComponentId,
    pub display_name: String,
    pub available_versions: Vec<Version>,
    #[serde(default)]
    pub dependencies: Vec<ComponentId>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Hierarchy address; defaults to the identifier.
    #[serde(default)]
    pub path: Option<ComponentPath>,
    /// Declared level; defaults to the level implied by the path depth.
    #[serde(default)]
    pub level: Option<HierarchyLevel>,
    #[serde(default)]
    pub hot_swappable: Option<bool>,
    /// Owned sub-components loaded and cleaned up with this entry.
    #[serde(default)]
    pub children: Vec<ComponentId>,
}

impl ModuleMetadata {
    pub fn new(
        identifier: impl Into<ComponentId>,
        display_name: impl Into<String>,
        available_versions: Vec<Version>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            available_versions,
            dependencies: Vec::new(),
            capabilities: Vec::new(),
            path: None,
            level: None,
            hot_swappable: None,
            children: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_path(mut self, path: ComponentPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_level(mut self, level: HierarchyLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_hot_swappable(mut self, hot_swappable: bool) -> Self {
        self.hot_swappable = Some(hot_swappable);
        self
    }

    /// Copy of this entry that also offers `version`.
    pub fn with_version(&self, version: Version) -> Self {
        let mut next = self.clone();
        if !next.available_versions.contains(&version) {
            next.available_versions.push(version);
            next.available_versions.sort();
        }
        next
    }

    pub fn without_version(&self, version: &Version) -> Self {
        let mut next = self.clone();
        next.available_versions.retain(|v| v != version);
        next
    }

    pub fn has_version(&self, version: &Version) -> bool {
        self.available_versions.contains(version)
    }

    pub fn latest_version(&self) -> Option<&Version> {
        self.available_versions.iter().max()
    }

    /// Declared path, or the identifier read as a single dotted path.
    pub fn effective_path(&self) -> Option<ComponentPath> {
        self.path
            .clone()
            .or_else(|| ComponentPath::parse(self.identifier.as_str()).ok())
    }

    pub fn effective_level(&self) -> HierarchyLevel {
        self.level
            .or_else(|| self.effective_path().and_then(|p| HierarchyLevel::from_depth(p.depth())))
            .unwrap_or(HierarchyLevel::Module)
    }

    pub fn is_hot_swappable(&self) -> bool {
        let by_level = self.effective_level().is_hot_swappable_by_default();
        // System components are never hot-swappable, whatever the entry says.
        by_level && self.hot_swappable.unwrap_or(true)
    }

    /// Structural checks applied at discovery time.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::Invalid {
            identifier: self.identifier.to_string(),
            reason: reason.to_string(),
        };
        if self.identifier.as_str().is_empty() {
            return Err(invalid("identifier cannot be empty"));
        }
        if self.available_versions.is_empty() {
            return Err(invalid("available_versions cannot be empty"));
        }
        if self.dependencies.contains(&self.identifier) {
            return Err(invalid("component cannot depend on itself"));
        }
        if self.children.contains(&self.identifier) {
            return Err(invalid("component cannot own itself"));
        }
        if self.effective_path().is_none() {
            return Err(invalid("identifier is not a valid path and no path is declared"));
        }
        Ok(())
    }
}
